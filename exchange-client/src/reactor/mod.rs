//! The background event loop behind the blocking client.
//!
//! [`ReactorThread`] owns one dedicated OS thread running a single-threaded
//! tokio runtime. All network I/O and all client state live on that thread.
//! Callers on other threads submit closures with [`ReactorThread::run_on_loop`]
//! and block until the closure's future completes there.
//!
//! ```text
//!  caller thread(s)                     reactor thread
//!  ----------------                     --------------
//!  run_on_loop(f) --Command::Run(job)-->  spawn_local(f(session))
//!       |                                      |
//!  blocking_recv <------ oneshot --------- result
//! ```

pub mod session;

pub use session::Session;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

pub const THREAD_NAME: &str = "exchange-reactor";

/// Unit of work executed on the reactor thread.
pub type Job = Box<dyn FnOnce(Rc<Session>) -> LocalBoxFuture<'static, ()> + Send>;

enum Command {
    Run(Job),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopStatus {
    Stopped = 0,
    Starting = 1,
    Live = 2,
    Stopping = 3,
}

impl LoopStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopStatus::Starting,
            2 => LoopStatus::Live,
            3 => LoopStatus::Stopping,
            _ => LoopStatus::Stopped,
        }
    }
}

/// State visible to both the reactor thread and its callers.
struct Shared {
    status: AtomicU8,
    /// Why the loop last stopped on its own, if it did.
    fault: Mutex<Option<ClientError>>,
}

impl Shared {
    fn status(&self) -> LoopStatus {
        LoopStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: LoopStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    fn set_fault(&self, error: ClientError) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    fn fault(&self) -> Option<ClientError> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

pub struct ReactorThread {
    config: ClientConfig,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl ReactorThread {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                status: AtomicU8::new(LoopStatus::Stopped as u8),
                fault: Mutex::new(None),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn status(&self) -> LoopStatus {
        self.shared.status()
    }

    pub fn is_live(&self) -> bool {
        self.status() == LoopStatus::Live
    }

    /// The error that brought the last session down, if it did not end by
    /// [`stop`](Self::stop).
    pub fn last_error(&self) -> Option<ClientError> {
        self.shared.fault()
    }

    /// Starts the thread, connects both channels and blocks until the loop is
    /// live or the connect timeout expires.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() && matches!(self.status(), LoopStatus::Starting | LoopStatus::Live) {
            return Err(ClientError::AlreadyConnected);
        }
        if let Some(previous) = running.take() {
            // The previous session ended on its own and may still be tearing
            // down; wait for its thread before starting over.
            let _ = previous.handle.join();
        }

        *self.shared.fault.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.shared.set_status(LoopStatus::Starting);

        let (commands, queue) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_loop(config, shared, queue))
            .map_err(|e| {
                self.shared.set_status(LoopStatus::Stopped);
                ClientError::Transport(format!("failed to spawn reactor thread: {}", e))
            })?;
        *running = Some(Running { commands, handle });
        drop(running);

        let timeout = self.config.connect_timeout();
        let started = Instant::now();
        loop {
            match self.status() {
                LoopStatus::Live => return Ok(()),
                LoopStatus::Stopped => {
                    self.reap();
                    return Err(self.last_error().unwrap_or(ClientError::Disconnected));
                }
                _ if started.elapsed() >= timeout => break,
                _ => thread::sleep(self.config.poll_interval()),
            }
        }

        error!("Unable to connect to the exchange within {:?}", timeout);
        let _ = self.stop();
        Err(ClientError::ConnectionTimeout(timeout))
    }

    /// Stops the loop and joins its thread. Stopping a stopped reactor is a no-op.
    ///
    /// Every call still pending on the loop fails with
    /// [`ClientError::Disconnected`].
    pub fn stop(&self) -> Result<()> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return Ok(());
        };

        if self.status() != LoopStatus::Stopped {
            self.shared.set_status(LoopStatus::Stopping);
        }
        let _ = running.commands.send(Command::Shutdown);

        let timeout = self.config.connect_timeout();
        let started = Instant::now();
        while !running.handle.is_finished() {
            if started.elapsed() >= timeout {
                error!("Reactor did not stop within {:?}", timeout);
                return Err(ClientError::ShutdownTimeout(timeout));
            }
            thread::sleep(self.config.poll_interval());
        }
        let _ = running.handle.join();
        self.shared.set_status(LoopStatus::Stopped);
        Ok(())
    }

    fn reap(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            let _ = running.handle.join();
        }
    }

    fn commands(&self) -> Result<mpsc::UnboundedSender<Command>> {
        if !self.is_live() {
            return Err(ClientError::NotConnected);
        }
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.commands.clone())
            .ok_or(ClientError::NotConnected)
    }

    /// Runs `f` on the reactor thread and blocks until its future completes.
    ///
    /// Must not be called from the reactor thread itself, nor from inside
    /// another async runtime.
    pub fn run_on_loop<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(Rc<Session>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + 'static,
        R: Send + 'static,
    {
        let commands = self.commands()?;
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            async move {
                let _ = reply.send(f(session).await);
            }
            .boxed_local()
        });
        commands
            .send(Command::Run(job))
            .map_err(|_| ClientError::NotConnected)?;

        let started = Instant::now();
        let result = result.blocking_recv().unwrap_or(Err(ClientError::Disconnected));
        let elapsed = started.elapsed();
        if elapsed > self.config.slow_call_threshold() {
            warn!("Call to the exchange took {:.3}s", elapsed.as_secs_f64());
        }
        result
    }

    /// Runs a synchronous closure against the session state.
    pub fn with_state<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut crate::state::ClientState) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.run_on_loop(move |session| async move { Ok(f(&mut *session.state_mut())) })
    }
}

impl Drop for ReactorThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Reactor shutdown on drop failed: {}", e);
        }
    }
}

fn run_loop(config: ClientConfig, shared: Arc<Shared>, mut queue: mpsc::UnboundedReceiver<Command>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            shared.set_fault(ClientError::Transport(format!("failed to build runtime: {}", e)));
            shared.set_status(LoopStatus::Stopped);
            return;
        }
    };
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async {
        let session = tokio::select! {
            opened = Session::open(&config) => match opened {
                Ok(session) => session,
                Err(e) => {
                    error!("Unable to connect to {}: {}", config.host, e);
                    shared.set_fault(e);
                    return;
                }
            },
            _ = wait_for_shutdown(&mut queue) => return,
        };

        shared.set_status(LoopStatus::Live);
        info!(
            "Connected to {} (info {}, exec {})",
            config.host, config.info_port, config.exec_port
        );

        loop {
            tokio::select! {
                command = queue.recv() => match command {
                    Some(Command::Run(job)) => {
                        tokio::task::spawn_local(job(session.clone()));
                    }
                    Some(Command::Shutdown) | None => {
                        debug!("Reactor shutting down");
                        break;
                    }
                },
                _ = session.closed() => {
                    if let Some(fault) = session.fault() {
                        shared.set_fault(fault);
                    }
                    break;
                }
            }
        }

        shared.set_status(LoopStatus::Stopping);
        session.fail(ClientError::Disconnected);
    });

    // Dropping the LocalSet drops every job still in flight, which fails its caller.
    drop(local);
    drop(runtime);
    shared.set_status(LoopStatus::Stopped);
    info!("Disconnected from the exchange");
}

/// Completes when a shutdown is requested while the session is still connecting.
async fn wait_for_shutdown(queue: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match queue.recv().await {
            Some(Command::Shutdown) | None => return,
            // Nothing can be queued before the loop is live.
            Some(Command::Run(_)) => continue,
        }
    }
}
