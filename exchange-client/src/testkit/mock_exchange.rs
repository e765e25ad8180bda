//! A scriptable in-process exchange speaking the real wire protocol over TCP.
//!
//! The mock runs on its own thread and runtime, so tests drive the blocking
//! [`Exchange`](crate::Exchange) from plain `#[test]` functions.

use crate::comms::frame::{Envelope, FrameCodec};
use crate::comms::messages::*;
use crate::comms::packet::{Message, MessageType, RawMessage};
use crate::comms::ChannelKind;
use crate::config::ClientConfig;
use anyhow::{Context, Result};
use exchange::{Instrument, InstrumentId, OrderId};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

/// How the mock answers requests.
#[derive(Debug, Clone)]
pub struct MockSettings {
    pub username: String,
    pub password: String,
    /// Positions reported in the login reply.
    pub positions: Vec<WirePosition>,
    /// Instruments announced right after the information subscription.
    pub instruments: Vec<Instrument>,
    /// Record order requests but never answer them.
    pub hold_order_replies: bool,
    /// Collect this many order replies, then send them in reverse order.
    pub reverse_batch: usize,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            username: "trader".to_string(),
            password: "secret".to_string(),
            positions: Vec::new(),
            instruments: Vec::new(),
            hold_order_replies: false,
            reverse_batch: 1,
        }
    }
}

#[derive(Default)]
struct Book {
    settings: MockSettings,
    received: Vec<(ChannelKind, Message)>,
    writers: HashMap<ChannelKind, mpsc::UnboundedSender<Vec<u8>>>,
    orders: HashMap<OrderId, OrderUpdate>,
    next_order_id: OrderId,
    batch: Vec<GenericReply>,
}

fn lock(book: &Mutex<Book>) -> MutexGuard<'_, Book> {
    book.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockExchange {
    info_port: u16,
    exec_port: u16,
    book: Arc<Mutex<Book>>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockExchange {
    pub fn start() -> Result<Self> {
        Self::with_settings(MockSettings::default())
    }

    pub fn with_settings(settings: MockSettings) -> Result<Self> {
        let info = std::net::TcpListener::bind("127.0.0.1:0").context("Failed to bind info port")?;
        let exec = std::net::TcpListener::bind("127.0.0.1:0").context("Failed to bind exec port")?;
        info.set_nonblocking(true)?;
        exec.set_nonblocking(true)?;
        let info_port = info.local_addr()?.port();
        let exec_port = exec.local_addr()?.port();

        let book = Arc::new(Mutex::new(Book {
            settings,
            next_order_id: 1,
            ..Book::default()
        }));
        let (shutdown, stop) = oneshot::channel();

        let shared = book.clone();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build mock runtime")?;
        let handle = thread::Builder::new()
            .name("mock-exchange".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let (info, exec) = match (TcpListener::from_std(info), TcpListener::from_std(exec)) {
                        (Ok(info), Ok(exec)) => (info, exec),
                        (Err(e), _) | (_, Err(e)) => {
                            warn!("Mock exchange failed to listen: {}", e);
                            return;
                        }
                    };
                    tokio::select! {
                        _ = accept_loop(info, ChannelKind::Info, shared.clone()) => {}
                        _ = accept_loop(exec, ChannelKind::Execution, shared) => {}
                        _ = stop => {}
                    }
                });
            })
            .context("Failed to spawn mock exchange thread")?;

        debug!("Mock exchange listening on info {} exec {}", info_port, exec_port);
        Ok(Self {
            info_port,
            exec_port,
            book,
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Client config pointing at this mock.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.info_port, self.exec_port)
    }

    pub fn info_port(&self) -> u16 {
        self.info_port
    }

    pub fn exec_port(&self) -> u16 {
        self.exec_port
    }

    pub fn settings(&self) -> MockSettings {
        lock(&self.book).settings.clone()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut MockSettings)) {
        update(&mut lock(&self.book).settings);
    }

    pub fn push_info(&self, message: Message) -> Result<()> {
        self.push(ChannelKind::Info, message)
    }

    pub fn push_exec(&self, message: Message) -> Result<()> {
        self.push(ChannelKind::Execution, message)
    }

    pub fn push(&self, channel: ChannelKind, message: Message) -> Result<()> {
        let envelope = message.encode()?;
        self.push_envelope(channel, &envelope)
    }

    /// Sends a message with an arbitrary type tag and body.
    pub fn push_raw(&self, channel: ChannelKind, raw: RawMessage) -> Result<()> {
        self.push_envelope(channel, &raw.to_envelope()?)
    }

    fn push_envelope(&self, channel: ChannelKind, envelope: &Envelope) -> Result<()> {
        let book = lock(&self.book);
        let writer = book
            .writers
            .get(&channel)
            .with_context(|| format!("no client connected on the {} channel", channel))?;
        writer
            .send(FrameCodec::encode(envelope))
            .ok()
            .with_context(|| format!("{} connection is gone", channel))
    }

    /// Fills an outstanding order and reports the fill like the exchange would.
    pub fn fill(&self, order_id: OrderId, volume: i64) -> Result<()> {
        let (trade, update) = {
            let mut book = lock(&self.book);
            let order = book
                .orders
                .get_mut(&order_id)
                .with_context(|| format!("no outstanding order {}", order_id))?;
            let volume = volume.min(order.volume);
            order.volume -= volume;
            let trade = PrivateTrade {
                order_id,
                instrument_id: order.instrument_id.clone(),
                price: order.price,
                volume,
                side: order.side.clone(),
            };
            let update = order.clone();
            if update.volume == 0 {
                book.orders.remove(&order_id);
            }
            (trade, update)
        };
        self.push_exec(Message::OrderUpdate(update))?;
        self.push_exec(Message::PrivateTrade(trade))
    }

    /// Publishes a public trade and updates the last traded price.
    pub fn trade_tick(&self, instrument_id: &str, price: f64, volume: i64) -> Result<()> {
        self.push_info(Message::TradeTick(TradeTickUpdate {
            instrument_id: instrument_id.to_string(),
            price,
            volume,
            aggressor_side: "bid".to_string(),
            buyer: "buyer".to_string(),
            seller: "seller".to_string(),
            trade_id: 0,
            timestamp_ns: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        }))
    }

    /// Every message received so far, in arrival order per channel.
    pub fn received(&self) -> Vec<(ChannelKind, Message)> {
        lock(&self.book).received.clone()
    }

    pub fn received_count(&self, message_type: MessageType) -> usize {
        lock(&self.book)
            .received
            .iter()
            .filter(|(_, m)| m.message_type() == message_type)
            .count()
    }

    pub fn outstanding_orders(&self) -> HashMap<OrderId, OrderUpdate> {
        lock(&self.book).orders.clone()
    }

    /// Drops both client connections as if the exchange went away.
    pub fn close_connections(&self) {
        lock(&self.book).writers.clear();
    }
}

impl Drop for MockExchange {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

async fn accept_loop(listener: TcpListener, channel: ChannelKind, book: Arc<Mutex<Book>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Mock exchange: {} client connected from {}", channel, peer);
                tokio::spawn(serve(stream, channel, book.clone()));
            }
            Err(e) => {
                warn!("Mock exchange accept failed: {}", e);
                return;
            }
        }
    }
}

async fn serve(stream: TcpStream, channel: ChannelKind, book: Arc<Mutex<Book>>) {
    let (reader, mut writer) = stream.into_split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<Vec<u8>>();
    lock(&book).writers.insert(channel, outbound);

    tokio::spawn(async move {
        while let Some(bytes) = queue.recv().await {
            if writer.write_all(&bytes).await.is_err() {
                return;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut reader = BufReader::new(reader);
    while let Ok(envelope) = FrameCodec::read_envelope(&mut reader).await {
        let message = match Message::decode(&envelope) {
            Ok(message) => message,
            Err(e) => {
                warn!("Mock exchange got a bad message: {}", e);
                break;
            }
        };
        respond(&book, channel, message);
    }
    debug!("Mock exchange: {} client went away", channel);
}

fn send(book: &Book, channel: ChannelKind, message: Message) {
    let Some(writer) = book.writers.get(&channel) else {
        return;
    };
    match message.encode() {
        Ok(envelope) => {
            let _ = writer.send(FrameCodec::encode(&envelope));
        }
        Err(e) => warn!("Mock exchange failed to encode {:?}: {}", message.message_type(), e),
    }
}

fn reply(book: &Book, channel: ChannelKind, request_id: u64, body: ReplyBody) {
    send(book, channel, Message::GenericReply(GenericReply::new(request_id, body)));
}

/// Queues an order reply, honouring the hold and reverse-batch settings.
fn order_reply(book: &mut Book, request_id: u64, body: ReplyBody) {
    if book.settings.hold_order_replies {
        return;
    }
    book.batch.push(GenericReply::new(request_id, body));
    if book.batch.len() >= book.settings.reverse_batch.max(1) {
        let batch = std::mem::take(&mut book.batch);
        for reply in batch.into_iter().rev() {
            send(book, ChannelKind::Execution, Message::GenericReply(reply));
        }
    }
}

fn respond(book: &Mutex<Book>, channel: ChannelKind, message: Message) {
    let mut book = lock(book);
    book.received.push((channel, message.clone()));

    match message {
        Message::InfoSubscribe(m) => {
            reply(&book, channel, m.request_id, ReplyBody::Ack);
            for instrument in book.settings.instruments.clone() {
                send(
                    &book,
                    ChannelKind::Info,
                    Message::InstrumentCreated(InstrumentCreated::from_instrument(&instrument)),
                );
            }
        }
        Message::Login(m) => {
            let body = if m.username == book.settings.username && m.password == book.settings.password {
                ReplyBody::LoggedIn {
                    positions: book.settings.positions.clone(),
                }
            } else {
                ReplyBody::Rejected {
                    reason: format!("invalid credentials for {}", m.username),
                }
            };
            reply(&book, channel, m.request_id, body);
        }
        Message::InsertOrder(m) => {
            let order_id = book.next_order_id;
            book.next_order_id += 1;
            let update = OrderUpdate {
                order_id,
                instrument_id: m.instrument_id,
                price: m.price,
                volume: m.volume,
                side: m.side,
            };
            let ioc = m.order_type == "ioc";
            order_reply(&mut book, m.request_id, ReplyBody::OrderInserted { order_id });
            if !ioc {
                book.orders.insert(order_id, update.clone());
                send(&book, ChannelKind::Execution, Message::OrderUpdate(update));
            }
        }
        Message::AmendOrder(m) => {
            let known = match book.orders.get_mut(&m.order_id) {
                Some(order) if m.volume > 0 => {
                    order.volume = m.volume;
                    true
                }
                _ => false,
            };
            order_reply(&mut book, m.request_id, ReplyBody::Success(known));
            if let Some(order) = book.orders.get(&m.order_id).cloned() {
                send(&book, ChannelKind::Execution, Message::OrderUpdate(order));
            }
        }
        Message::DeleteOrder(m) => {
            let removed = book.orders.remove(&m.order_id);
            order_reply(&mut book, m.request_id, ReplyBody::Success(removed.is_some()));
            if let Some(mut order) = removed {
                order.volume = 0;
                send(&book, ChannelKind::Execution, Message::OrderUpdate(order));
            }
        }
        Message::DeleteOrders(m) => {
            let ids: Vec<OrderId> = book
                .orders
                .values()
                .filter(|o| o.instrument_id == m.instrument_id)
                .map(|o| o.order_id)
                .collect();
            order_reply(&mut book, m.request_id, ReplyBody::Ack);
            for id in ids {
                if let Some(mut order) = book.orders.remove(&id) {
                    order.volume = 0;
                    send(&book, ChannelKind::Execution, Message::OrderUpdate(order));
                }
            }
        }
        Message::UpdateInstrumentParameters(m) => {
            reply(&book, channel, m.request_id, ReplyBody::Ack);
            send(
                &book,
                ChannelKind::Info,
                Message::InstrumentParametersUpdated(InstrumentParametersUpdated {
                    instrument_id: m.instrument_id,
                    parameters: m.parameters,
                }),
            );
        }
        other => {
            warn!("Mock exchange ignoring {:?}", other.message_type());
        }
    }
}

/// Shorthand for a position entry in [`MockSettings::positions`].
pub fn position(instrument_id: impl Into<InstrumentId>, volume: i64, cash: f64) -> WirePosition {
    WirePosition::new(instrument_id, volume, cash)
}
