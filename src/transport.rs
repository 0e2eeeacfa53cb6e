//! Connection lifecycle state machine.
//!
//! The transport is an actor: a single task owns the socket, the status,
//! and the reconnect budget, and everything else — caller handles, connect
//! tasks, the read and write loops — reaches it only by posting events to
//! its mailbox. Events are processed strictly in arrival order, so no lock
//! guards any of the mutable state.
//!
//! Lifecycle: `NotStarted → Connecting → Running → Reconnecting →
//! Terminated`, with `Reconnecting → Connecting` on each retry. The byte
//! channels and the caller handle outlive any one socket; each socket's
//! read/write loops live under their own generation of the shutdown token,
//! and a fresh token is installed on every reconnect so a cancelled
//! predecessor can never cancel its successor.

mod event;
mod handle;
mod loops;
mod socket;
mod status;

use log::{error, info, warn};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;

pub use handle::TransportHandle;
pub use status::{ConnectionStatus, TerminationReason};

use event::{ConnectReply, Event};
use socket::ConnectSpec;

use crate::{
    channel::{ByteReceiver, ByteSender, byte_channel},
    config::TransportConfig,
    error::TransportError,
    reconnect::ReconnectPolicy,
    stream::BoxedSessionStream,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Connecting,
    Running,
    Reconnecting,
    Terminated,
}

/// The transport actor.
///
/// [`create`](Self::create) allocates the channels and the handle without
/// touching the network; [`run`](Self::run) is the actor future, usually
/// spawned via [`spawn`](Self::spawn).
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use tether::{config::TransportConfig, transport::Transport};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tether::error::TransportError> {
/// let config = TransportConfig::new("broker.example", 1883);
/// let mut handle = Transport::spawn(config);
/// handle.connect(Duration::from_secs(5)).await?;
/// handle.close();
/// handle.wait_terminated().await;
/// # Ok(())
/// # }
/// ```
pub struct Transport {
    config: TransportConfig,
    events_rx: mpsc::UnboundedReceiver<Event>,
    events_tx: mpsc::WeakUnboundedSender<Event>,
    outbound_rx: Option<ByteReceiver>,
    inbound_tx: Option<ByteSender>,
    status: watch::Sender<ConnectionStatus>,
    terminated: Option<oneshot::Sender<TerminationReason>>,
    policy: ReconnectPolicy,
    state: State,
    generation: u64,
    shutdown: CancellationToken,
    read_task: Option<JoinHandle<()>>,
    write_task: Option<JoinHandle<ByteReceiver>>,
    pending_connect: Option<ConnectReply>,
    connect_in_flight: bool,
}

impl Transport {
    /// Allocate the transport and its handle. No socket I/O occurs here.
    #[must_use]
    pub fn create(config: TransportConfig) -> (Self, TransportHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = byte_channel();
        let (inbound_tx, inbound_rx) = byte_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::NotStarted);
        let (terminated_tx, terminated_rx) = oneshot::channel();

        let policy = ReconnectPolicy::new(
            config.max_reconnect_attempts,
            config.reconnect_interval,
        );
        let max_frame_size = config.max_frame_size;
        let transport = Self {
            config,
            events_rx,
            events_tx: events_tx.downgrade(),
            outbound_rx: Some(outbound_rx),
            inbound_tx: Some(inbound_tx),
            status: status_tx,
            terminated: Some(terminated_tx),
            policy,
            state: State::Connecting,
            generation: 0,
            shutdown: CancellationToken::new(),
            read_task: None,
            write_task: None,
            pending_connect: None,
            connect_in_flight: false,
        };
        let handle = TransportHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
            events: events_tx,
            status: status_rx,
            terminated: Some(terminated_rx),
            final_reason: None,
            max_frame_size,
        };
        (transport, handle)
    }

    /// Create the transport and spawn its actor on the current runtime.
    #[must_use]
    pub fn spawn(config: TransportConfig) -> TransportHandle {
        let (transport, handle) = Self::create(config);
        tokio::spawn(transport.run());
        handle
    }

    /// Drive the actor until termination.
    ///
    /// Returns after the terminated one-shot has fired. If every handle is
    /// dropped without a close, the transport aborts itself.
    pub async fn run(mut self) {
        while self.state != State::Terminated {
            let Some(event) = self.events_rx.recv().await else {
                self.full_shutdown(TerminationReason::Aborted).await;
                break;
            };
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Connect { deadline, reply } => self.on_connect_requested(deadline, reply),
            Event::ConnectResult { generation, result } => {
                self.on_connect_result(generation, result).await;
            }
            Event::ReadFinished { generation, error } => {
                let error = error.map(TransportError::Read);
                self.on_socket_lost(generation, error).await;
            }
            Event::WriteError { generation, error } => {
                self.on_socket_lost(generation, Some(TransportError::Write(error)))
                    .await;
            }
            Event::Close => self.on_close().await,
        }
    }

    fn on_connect_requested(&mut self, deadline: Instant, reply: Option<ConnectReply>) {
        match self.state {
            State::Connecting | State::Reconnecting if !self.connect_in_flight => {
                self.state = State::Connecting;
                self.set_status(ConnectionStatus::Connecting);
                self.connect_in_flight = true;
                if let Some(reply) = reply {
                    self.pending_connect = Some(reply);
                }
                let Some(events) = self.events_tx.upgrade() else {
                    return;
                };
                let spec = ConnectSpec::from_config(&self.config);
                let generation = self.generation;
                info!(
                    "connecting: host={}, port={}, generation={generation}",
                    self.config.host, self.config.port
                );
                tokio::spawn(async move {
                    let result = socket::establish(&spec, deadline).await;
                    let _ = events.send(Event::ConnectResult { generation, result });
                });
            }
            State::Terminated => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(TransportError::Cancelled));
                }
            }
            _ => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(TransportError::connect_reason(
                        std::io::ErrorKind::InvalidInput,
                        "transport is already connecting or connected",
                    )));
                }
            }
        }
    }

    async fn on_connect_result(
        &mut self,
        generation: u64,
        result: Result<BoxedSessionStream, TransportError>,
    ) {
        if generation != self.generation || self.state != State::Connecting {
            // A superseded attempt; dropping the stream disposes its socket.
            return;
        }
        self.connect_in_flight = false;
        match result {
            Ok(stream) => {
                self.policy.reset();
                self.shutdown = CancellationToken::new();
                self.state = State::Running;
                self.set_status(ConnectionStatus::Connected);
                info!(
                    "connected: host={}, port={}, generation={}",
                    self.config.host, self.config.port, self.generation
                );
                self.spawn_loops(stream);
                if let Some(reply) = self.pending_connect.take() {
                    let _ = reply.send(Ok(()));
                }
            }
            Err(error) => {
                warn!(
                    "connect attempt failed: host={}, port={}, error={error}",
                    self.config.host, self.config.port
                );
                if let Some(reply) = self.pending_connect.take() {
                    // A caller whose request landed after the budget was
                    // already spent learns the terminal outcome; otherwise
                    // the attempt's own failure is the answer and retries
                    // continue behind the scenes.
                    let verdict = if self.policy.attempts() > 0 && self.policy.is_exhausted() {
                        TransportError::ReconnectExhausted {
                            attempts: self.policy.attempts(),
                        }
                    } else {
                        error
                    };
                    let _ = reply.send(Err(verdict));
                }
                self.begin_reconnect().await;
            }
        }
    }

    fn spawn_loops(&mut self, stream: BoxedSessionStream) {
        let Some(events) = self.events_tx.upgrade() else {
            return;
        };
        let (reader, writer) = tokio::io::split(stream);
        let inbound = self
            .inbound_tx
            .clone()
            .expect("inbound channel outlives every socket generation");
        let outbound = self
            .outbound_rx
            .take()
            .expect("outbound receiver is home between generations");
        let scratch_size = self.config.max_frame_size as usize;

        self.read_task = Some(tokio::spawn(loops::read_loop(
            reader,
            inbound,
            scratch_size,
            loops::LoopContext {
                events: events.clone(),
                shutdown: self.shutdown.clone(),
                generation: self.generation,
            },
        )));
        self.write_task = Some(tokio::spawn(loops::write_loop(
            writer,
            outbound,
            loops::LoopContext {
                events,
                shutdown: self.shutdown.clone(),
                generation: self.generation,
            },
        )));
    }

    async fn on_socket_lost(&mut self, generation: u64, error: Option<TransportError>) {
        if generation != self.generation || self.state != State::Running {
            // A loop from a superseded generation winding down.
            return;
        }
        match error {
            Some(error) => warn!("connection lost: generation={generation}, error={error}"),
            None => info!("server closed the connection: generation={generation}"),
        }
        if self.dispose_socket().await {
            self.set_status(ConnectionStatus::Aborted);
            self.begin_reconnect().await;
        } else {
            self.full_shutdown(TerminationReason::Error).await;
        }
    }

    async fn on_close(&mut self) {
        match self.state {
            State::Running => {
                info!("closing at caller request");
                self.full_shutdown(TerminationReason::Normal).await;
            }
            State::Terminated => {}
            State::Connecting | State::Reconnecting => {
                info!("aborting before a connection was established");
                self.full_shutdown(TerminationReason::Aborted).await;
            }
        }
    }

    /// Tear down the current socket by cancelling its generation and
    /// joining both loops. Idempotent. Returns `false` when the outbound
    /// receiver could not be recovered from the write loop.
    async fn dispose_socket(&mut self) -> bool {
        self.shutdown.cancel();
        if let Some(task) = self.read_task.take() {
            let _ = task.await;
        }
        let Some(task) = self.write_task.take() else {
            return true;
        };
        match task.await {
            Ok(outbound) => {
                self.outbound_rx = Some(outbound);
                true
            }
            Err(join_error) => {
                error!("write loop did not exit cleanly: error={join_error}");
                false
            }
        }
    }

    async fn begin_reconnect(&mut self) {
        self.state = State::Reconnecting;
        match self.policy.next_attempt() {
            None => {
                warn!(
                    "reconnect budget exhausted: attempts={}, max={}",
                    self.policy.attempts(),
                    self.policy.max_attempts()
                );
                self.full_shutdown(TerminationReason::CouldNotConnect).await;
            }
            Some(delay) => {
                self.generation += 1;
                self.shutdown = CancellationToken::new();
                info!(
                    "reconnect scheduled: attempt={}/{}, delay={delay:?}, generation={}",
                    self.policy.attempts(),
                    self.policy.max_attempts(),
                    self.generation
                );
                let Some(events) = self.events_tx.upgrade() else {
                    return;
                };
                let interval = self.policy.interval();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = events.send(Event::Connect {
                        deadline: Instant::now() + interval,
                        reply: None,
                    });
                });
            }
        }
    }

    async fn full_shutdown(&mut self, reason: TerminationReason) {
        self.dispose_socket().await;
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(TransportError::Cancelled));
        }
        // Dropping the receiver releases any cells still queued outbound.
        drop(self.outbound_rx.take());
        if let Some(inbound) = self.inbound_tx.take() {
            inbound.complete();
        }
        let status = reason.final_status();
        self.set_status(status);
        if let Some(terminated) = self.terminated.take() {
            let _ = terminated.send(reason);
        }
        self.state = State::Terminated;
        info!("transport terminated: reason={reason}, status={status}");
    }

    fn set_status(&self, status: ConnectionStatus) { self.status.send_replace(status); }
}
