//! Everything that lives on the reactor thread for one connected session.
//!
//! A `Session` owns both channel links and the client state. It is only ever
//! touched from the reactor's `LocalSet`, so shared access goes through `Rc`
//! and `RefCell`; no borrow is held across an `.await`.

use crate::comms::frame::{Envelope, FrameCodec};
use crate::comms::messages::*;
use crate::comms::packet::Message;
use crate::comms::{ChannelKind, ChannelLink};
use crate::config::ClientConfig;
use crate::error::{ClientError, FrameError, ProtocolError, Result};
use crate::logging::MESSAGE_TARGET;
use crate::state::{dispatch, ClientState};
use exchange::{InstrumentId, OrderId, OrderType, Side};
use log::{error, info, trace};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use tokio::io::BufReader;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::Notify;

pub struct Session {
    info: ChannelLink,
    exec: ChannelLink,
    state: RefCell<ClientState>,
    fault: RefCell<Option<ClientError>>,
    closed: Notify,
}

impl Session {
    /// Connects both channels and starts reading from them.
    ///
    /// Must run inside the reactor's `LocalSet`.
    pub(crate) async fn open(config: &ClientConfig) -> Result<Rc<Self>> {
        let log_messages = config.full_message_logging;
        let (info, info_reader) =
            ChannelLink::open(ChannelKind::Info, &config.host, config.info_port, log_messages).await?;
        let (exec, exec_reader) = ChannelLink::open(
            ChannelKind::Execution,
            &config.host,
            config.exec_port,
            log_messages,
        )
        .await?;

        let session = Rc::new(Self::new(info, exec, config.max_nr_trade_history));
        tokio::task::spawn_local(read_loop(session.clone(), ChannelKind::Info, info_reader));
        tokio::task::spawn_local(read_loop(session.clone(), ChannelKind::Execution, exec_reader));
        Ok(session)
    }

    pub fn new(info: ChannelLink, exec: ChannelLink, history_capacity: usize) -> Self {
        Self {
            info,
            exec,
            state: RefCell::new(ClientState::new(history_capacity)),
            fault: RefCell::new(None),
            closed: Notify::new(),
        }
    }

    pub fn link(&self, channel: ChannelKind) -> &ChannelLink {
        match channel {
            ChannelKind::Info => &self.info,
            ChannelKind::Execution => &self.exec,
        }
    }

    pub fn state(&self) -> Ref<'_, ClientState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, ClientState> {
        self.state.borrow_mut()
    }

    pub fn fault(&self) -> Option<ClientError> {
        self.fault.borrow().clone()
    }

    /// Resolves once the session has been torn down.
    pub async fn closed(&self) {
        if self.fault.borrow().is_some() {
            return;
        }
        self.closed.notified().await;
    }

    /// Handles one envelope read from `channel`.
    pub fn handle_envelope(&self, channel: ChannelKind, envelope: &Envelope) -> Result<()> {
        let message = Message::decode(envelope)?;
        if self.link(channel).log_messages() {
            trace!(target: MESSAGE_TARGET, "[{}] <- {:?}", channel, message);
        }

        match message {
            Message::GenericReply(reply) => self.link(channel).resolve(reply)?,
            push => dispatch(&mut self.state.borrow_mut(), channel, push)?,
        }
        Ok(())
    }

    /// Tears the session down: every pending call on both channels fails with
    /// `error` and [`closed`](Self::closed) resolves. Only the first call counts.
    pub fn fail(&self, error: ClientError) {
        if self.fault.borrow().is_some() {
            return;
        }
        *self.fault.borrow_mut() = Some(error.clone());

        let failed = self.info.fail(error.clone()) + self.exec.fail(error);
        if failed > 0 {
            info!("Failed {} pending request(s)", failed);
        }
        self.closed.notify_waiters();
        self.closed.notify_one();
    }

    // -----------------------------------------------------------------------
    // Requests

    pub async fn subscribe_info(&self, admin_password: Option<String>) -> Result<()> {
        let reply = self
            .info
            .request(|request_id| {
                Message::InfoSubscribe(InfoSubscribe {
                    request_id,
                    admin_password,
                })
            })
            .await?;
        match reply {
            ReplyBody::Ack => Ok(()),
            ReplyBody::Rejected { reason } => Err(ClientError::Authentication(reason)),
            _ => Err(self.unexpected(&reply)),
        }
    }

    /// Logs in on the execution channel and seeds the ledger from the reply.
    pub async fn login(&self, username: String, password: String, admin_password: Option<String>) -> Result<()> {
        let reply = self
            .exec
            .request(|request_id| {
                Message::Login(Login {
                    request_id,
                    username,
                    password,
                    admin_password,
                })
            })
            .await?;
        match reply {
            ReplyBody::LoggedIn { positions } => {
                self.state_mut()
                    .exec
                    .ledger
                    .seed(positions.iter().map(WirePosition::to_entry));
                Ok(())
            }
            ReplyBody::Rejected { reason } => Err(ClientError::Authentication(reason)),
            _ => Err(self.unexpected(&reply)),
        }
    }

    pub async fn insert_order(
        &self,
        instrument_id: InstrumentId,
        price: f64,
        volume: i64,
        side: Side,
        order_type: OrderType,
    ) -> Result<OrderId> {
        let reply = self
            .exec
            .request(|request_id| {
                Message::InsertOrder(InsertOrder {
                    request_id,
                    instrument_id,
                    price,
                    volume,
                    side: side.as_str().to_string(),
                    order_type: order_type.as_str().to_string(),
                })
            })
            .await?;
        match reply {
            ReplyBody::OrderInserted { order_id } => Ok(order_id),
            ReplyBody::Rejected { reason } => Err(ClientError::OrderRejected(reason)),
            _ => Err(self.unexpected(&reply)),
        }
    }

    pub async fn amend_order(&self, instrument_id: InstrumentId, order_id: OrderId, volume: i64) -> Result<bool> {
        let reply = self
            .exec
            .request(|request_id| {
                Message::AmendOrder(AmendOrder {
                    request_id,
                    instrument_id,
                    order_id,
                    volume,
                })
            })
            .await?;
        self.success(reply)
    }

    pub async fn delete_order(&self, instrument_id: InstrumentId, order_id: OrderId) -> Result<bool> {
        let reply = self
            .exec
            .request(|request_id| {
                Message::DeleteOrder(DeleteOrder {
                    request_id,
                    instrument_id,
                    order_id,
                })
            })
            .await?;
        self.success(reply)
    }

    pub async fn delete_orders(&self, instrument_id: InstrumentId) -> Result<()> {
        let reply = self
            .exec
            .request(|request_id| {
                Message::DeleteOrders(DeleteOrders {
                    request_id,
                    instrument_id,
                })
            })
            .await?;
        self.acknowledged(reply)
    }

    pub async fn update_instrument_parameters(&self, instrument_id: InstrumentId, parameters: String) -> Result<()> {
        let reply = self
            .exec
            .request(|request_id| {
                Message::UpdateInstrumentParameters(UpdateInstrumentParameters {
                    request_id,
                    instrument_id,
                    parameters,
                })
            })
            .await?;
        self.acknowledged(reply)
    }

    /// A reply of the wrong kind is a protocol violation: the whole session goes
    /// down and every other pending call sees the same error.
    fn unexpected(&self, reply: &ReplyBody) -> ClientError {
        let error = ClientError::Protocol(ProtocolError::Malformed(format!("unexpected reply {:?}", reply)));
        error!("Fatal error, closing session: {}", error);
        self.fail(error.clone());
        error
    }

    fn success(&self, reply: ReplyBody) -> Result<bool> {
        match reply {
            ReplyBody::Success(success) => Ok(success),
            ReplyBody::Rejected { reason } => Err(ClientError::Rejected(reason)),
            _ => Err(self.unexpected(&reply)),
        }
    }

    fn acknowledged(&self, reply: ReplyBody) -> Result<()> {
        match reply {
            ReplyBody::Ack | ReplyBody::Success(true) => Ok(()),
            ReplyBody::Rejected { reason } => Err(ClientError::Rejected(reason)),
            _ => Err(self.unexpected(&reply)),
        }
    }
}

/// Reads envelopes off one channel until the connection or the session ends.
async fn read_loop(session: Rc<Session>, channel: ChannelKind, reader: OwnedReadHalf) {
    let mut reader = BufReader::new(reader);
    loop {
        let envelope = tokio::select! {
            read = FrameCodec::read_envelope(&mut reader) => read,
            _ = session.closed() => return,
        };

        let outcome = match envelope {
            Ok(envelope) => session.handle_envelope(channel, &envelope),
            Err(FrameError::ConnectionClosed) => {
                info!("[{}] Connection closed by the exchange", channel);
                Err(ClientError::Disconnected)
            }
            Err(FrameError::Io(e)) => {
                error!("[{}] Read failed: {}", channel, e);
                Err(ClientError::Disconnected)
            }
            Err(e) => Err(ClientError::Framing(e)),
        };

        if let Err(e) = outcome {
            if e != ClientError::Disconnected {
                error!("[{}] Fatal error, closing session: {}", channel, e);
            }
            session.fail(e);
            return;
        }
    }
}
