//! One TCP connection to the exchange, as seen from the reactor.
//!
//! Outgoing envelopes go through an unbounded queue drained by a single writer
//! task, so concurrent requests never interleave their bytes on the socket.
//! The read half is handed back to the caller, who owns the read loop.

use crate::comms::correlator::RequestCorrelator;
use crate::comms::frame::FrameCodec;
use crate::comms::messages::{GenericReply, ReplyBody};
use crate::comms::packet::Message;
use crate::comms::ChannelKind;
use crate::error::{ClientError, ProtocolError, Result};
use crate::logging::MESSAGE_TARGET;
use log::{debug, error, trace};
use std::cell::RefCell;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub struct ChannelLink {
    kind: ChannelKind,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    correlator: RequestCorrelator<ReplyBody>,
    fault: RefCell<Option<ClientError>>,
    log_messages: bool,
}

impl ChannelLink {
    /// Connects to `host:port` and starts the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(
        kind: ChannelKind,
        host: &str,
        port: u16,
        log_messages: bool,
    ) -> Result<(Self, OwnedReadHalf)> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            ClientError::Transport(format!("{} channel to {}:{}: {}", kind, host, port, e))
        })?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        let (outbound, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(kind, writer, queue));
        debug!("[{}] Connected to {}:{}", kind, host, port);

        Ok((Self::new(kind, outbound, log_messages), reader))
    }

    pub fn new(kind: ChannelKind, outbound: mpsc::UnboundedSender<Vec<u8>>, log_messages: bool) -> Self {
        Self {
            kind,
            outbound,
            correlator: RequestCorrelator::new(),
            fault: RefCell::new(None),
            log_messages,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Encodes and queues a message for the writer task.
    pub fn send(&self, message: &Message) -> Result<()> {
        if let Some(fault) = self.fault.borrow().clone() {
            return Err(fault);
        }
        if self.log_messages {
            trace!(target: MESSAGE_TARGET, "[{}] -> {:?}", self.kind, message);
        }
        let bytes = FrameCodec::encode(&message.encode()?);
        self.outbound
            .send(bytes)
            .map_err(|_| ClientError::Disconnected)
    }

    /// Sends the request built by `build` under a fresh id and waits for its reply.
    pub async fn request(&self, build: impl FnOnce(u64) -> Message) -> Result<ReplyBody> {
        let request_id = self.correlator.new_id();
        let slot = self.correlator.register(request_id)?;

        if let Err(e) = self.send(&build(request_id)) {
            self.correlator.forget(request_id);
            return Err(e);
        }

        // A dropped slot means the session went away underneath us.
        slot.await.unwrap_or(Err(ClientError::Disconnected))
    }

    pub fn resolve(&self, reply: GenericReply) -> std::result::Result<(), ProtocolError> {
        self.correlator.resolve(reply.request_id, Ok(reply.body))
    }

    /// Fails every pending request with `error` and refuses new ones.
    pub fn fail(&self, error: ClientError) -> usize {
        self.fault.borrow_mut().get_or_insert(error.clone());
        self.correlator.fail_all(error)
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn log_messages(&self) -> bool {
        self.log_messages
    }
}

async fn write_loop(
    kind: ChannelKind,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = queue.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            error!("[{}] Failed to write to the exchange: {}", kind, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
    debug!("[{}] Writer stopped", kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::frame::Envelope;
    use crate::comms::messages::DeleteOrders;

    fn link() -> (ChannelLink, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelLink::new(ChannelKind::Execution, tx, false), rx)
    }

    fn decode(bytes: &[u8]) -> Message {
        let (envelope, _): (Envelope, usize) = FrameCodec::decode(bytes).unwrap().unwrap();
        Message::decode(&envelope).unwrap()
    }

    #[tokio::test]
    async fn test_request_is_resolved_by_its_reply() {
        let (link, mut wire) = link();
        let local = tokio::task::LocalSet::new();

        local
            .run_until(async move {
                let link = std::rc::Rc::new(link);
                let requester = link.clone();
                let call = tokio::task::spawn_local(async move {
                    requester
                        .request(|request_id| {
                            Message::DeleteOrders(DeleteOrders {
                                request_id,
                                instrument_id: "ASML".into(),
                            })
                        })
                        .await
                });

                let sent = decode(&wire.recv().await.unwrap());
                let request_id = sent.request_id().unwrap();
                assert_eq!(link.pending_count(), 1);

                link.resolve(GenericReply::new(request_id, ReplyBody::Ack)).unwrap();
                assert_eq!(call.await.unwrap(), Ok(ReplyBody::Ack));
            })
            .await;
    }

    #[tokio::test]
    async fn test_failed_link_refuses_requests() {
        let (link, _wire) = link();
        link.fail(ClientError::Disconnected);

        let result = link
            .request(|request_id| {
                Message::DeleteOrders(DeleteOrders {
                    request_id,
                    instrument_id: "ASML".into(),
                })
            })
            .await;
        assert_eq!(result, Err(ClientError::Disconnected));
        assert_eq!(link.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_writer_is_disconnected() {
        let (link, wire) = link();
        drop(wire);
        assert_eq!(
            link.send(&Message::Ping(crate::comms::messages::Ping)),
            Err(ClientError::Disconnected)
        );
    }
}
