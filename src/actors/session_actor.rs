use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use rand::random;
use rtcp::receiver_report::{ReceiverReport, MAX_REPORT_BLOCKS};
use rtcp::Marshall;
use thiserror::Error;
use tokio::select;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::actors::{Message, RendererFactory, Transport, TransportError, TransportId};
use crate::media_header::{ParseError, RTPPacket};
use crate::report_builder::build_report_block;
use crate::source_registry::SourceRegistry;

type Sender = tokio::sync::mpsc::UnboundedSender<Message>;
type Receiver = tokio::sync::mpsc::UnboundedReceiver<Message>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    Idle,
    Listening,
    Running,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub datagrams: u64,
    pub malformed: u64,
    pub unsupported: u64,
    pub forwarded: u64,
    pub rejected: u64,
    pub reports_sent: u64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session failed to start: {0}")]
    Startup(#[source] TransportError),
    #[error("transport failed: {0}")]
    Transport(#[source] TransportError),
    #[error("session task ended abnormally: {0}")]
    Task(#[from] JoinError),
}

struct SessionActor<T, F: RendererFactory> {
    receiver: Receiver,
    notify: Sender,
    transport: T,
    renderer_factory: F,
    renderer: Option<F::Output>,
    registry: SourceRegistry,
    state: SessionState,
    transport_id: Option<TransportId>,
    stats: SessionStats,
    error: Option<SessionError>,
    sender_ssrc: u32,
}

impl<T, F> SessionActor<T, F>
where
    T: Transport,
    F: RendererFactory,
{
    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Start(host, port) => self.start(&host, port),
            Message::Datagram(id, datagram) => {
                if self.is_current(id) {
                    self.receive(datagram);
                } else {
                    trace!(target: "Session Actor", "Ignoring datagram from transport session {}", id);
                }
            }
            Message::TransportError(id, err) => {
                if self.is_current(id) {
                    self.fail(err);
                } else {
                    debug!(target: "Session Actor", "Ignoring error from transport session {}: {}", id, err);
                }
            }
        }
    }

    fn is_current(&self, id: TransportId) -> bool {
        self.state == SessionState::Running && self.transport_id == Some(id)
    }

    fn start(&mut self, host: &str, port: u16) {
        if self.state != SessionState::Idle {
            warn!(target: "Session Actor", "Session already started, ignoring start in state {:?}", self.state);
            return;
        }

        self.state = SessionState::Listening;
        match self.listen(host, port) {
            Ok(id) => {
                info!(target: "Session Actor", "Receiving from {} on port {}", host, port);
                self.transport_id = Some(id);
                self.state = SessionState::Running;
            }
            Err(err) => {
                error!(target: "Session Actor", "Failed to start session: {}", err);
                self.error = Some(SessionError::Startup(err));
                self.state = SessionState::Failed;
            }
        }
    }

    fn listen(&mut self, host: &str, port: u16) -> Result<TransportId, TransportError> {
        let id = self.transport.bind(port, self.notify.clone())?;
        if let Err(err) = self.transport.connect(id, host) {
            self.transport.destroy(id);
            return Err(err);
        }
        Ok(id)
    }

    fn receive(&mut self, datagram: bytes::Bytes) {
        self.stats.datagrams += 1;

        let packet = match RTPPacket::parse(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(target: "Session Actor", "Dropping datagram: {}", err);
                match err {
                    ParseError::Malformed(_) => self.stats.malformed += 1,
                    ParseError::Unsupported(_) => self.stats.unsupported += 1,
                }
                return;
            }
        };

        let renderer = self
            .renderer
            .get_or_insert_with(|| self.renderer_factory.create());

        let RTPPacket { header, payload } = packet;
        if self.registry.accept(header.ssrc, header.seq, payload, renderer) {
            self.stats.forwarded += 1;
        } else {
            trace!(target: "Session Actor", "Rejected seq:{} from ssrc:{}", header.seq, header.ssrc);
            self.stats.rejected += 1;
        }
    }

    fn fail(&mut self, err: TransportError) {
        error!(target: "Session Actor", "Transport failed: {}", err);
        if let Some(id) = self.transport_id.take() {
            self.transport.destroy(id);
        }
        self.error = Some(SessionError::Transport(err));
        self.state = SessionState::Failed;
    }

    fn send_report(&mut self) {
        let Some(id) = self.transport_id else {
            return;
        };
        if self.state != SessionState::Running || self.registry.is_empty() {
            return;
        }

        let reports = self
            .registry
            .iter_mut()
            .filter(|(_, validator)| validator.is_trusted())
            .take(MAX_REPORT_BLOCKS)
            .map(|(ssrc, validator)| build_report_block(*ssrc, validator))
            .collect::<Vec<_>>();
        if reports.is_empty() {
            return;
        }

        let report_count = reports.len();
        let packet = match ReceiverReport::new(self.sender_ssrc, reports).marshall() {
            Ok(packet) => packet,
            Err(err) => {
                warn!(target: "Session Actor", "Error marshalling receiver report: {}", err);
                return;
            }
        };

        match self.transport.send(id, packet) {
            Ok(()) => {
                debug!(target: "Session Actor", "Sent receiver report with {} blocks", report_count);
                self.stats.reports_sent += 1;
            }
            Err(err) => {
                warn!(target: "Session Actor", "Error sending receiver report: {}", err);
            }
        }
    }

    fn shutdown(mut self) -> Result<SessionStats, SessionError> {
        if let Some(id) = self.transport_id.take() {
            self.transport.destroy(id);
        }
        self.state = SessionState::Stopped;

        info!(
            target: "Session Actor",
            "Session stopped: {} sources, {} datagrams, {} forwarded, {} rejected, {} malformed, {} unsupported, {} reports",
            self.registry.len(),
            self.stats.datagrams,
            self.stats.forwarded,
            self.stats.rejected,
            self.stats.malformed,
            self.stats.unsupported,
            self.stats.reports_sent
        );

        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.stats),
        }
    }
}

/// Stops a session from any thread. Stopping a session that already ended is
/// a no-op.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

pub struct SessionActorHandle {
    pub sender: Sender,
    stop: StopHandle,
    task: JoinHandle<Result<SessionStats, SessionError>>,
}

impl SessionActorHandle {
    /// Spawns an idle session. `report_interval` of `None` disables receiver
    /// reports.
    pub fn new<T, F>(transport: T, renderer_factory: F, report_interval: Option<Duration>) -> Self
    where
        T: Transport + Send + 'static,
        F: RendererFactory + Send + 'static,
        F::Output: Send + 'static,
    {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel::<Message>();
        let (stop_sender, stop_receiver) = watch::channel(false);

        let actor = SessionActor {
            receiver,
            notify: sender.clone(),
            transport,
            renderer_factory,
            renderer: None,
            registry: SourceRegistry::default(),
            state: SessionState::Idle,
            transport_id: None,
            stats: SessionStats::default(),
            error: None,
            sender_ssrc: random::<u32>(),
        };
        let task = tokio::spawn(run(actor, stop_receiver, report_interval));

        Self {
            sender,
            stop: StopHandle {
                stop: Arc::new(stop_sender),
            },
            task,
        }
    }

    pub fn start(&self, host: impl Into<String>, port: u16) {
        if self.sender.send(Message::Start(host.into(), port)).is_err() {
            debug!(target: "Session Actor", "Session loop gone, ignoring start");
        }
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Resolves once the session loop ended, with the session's outcome.
    pub async fn wait(self) -> Result<SessionStats, SessionError> {
        let _stop = self.stop;
        self.task.await?
    }
}

async fn run<T, F>(
    mut actor: SessionActor<T, F>,
    mut stop: watch::Receiver<bool>,
    report_interval: Option<Duration>,
) -> Result<SessionStats, SessionError>
where
    T: Transport,
    F: RendererFactory,
{
    let mut report_timer = report_interval
        .filter(|period| !period.is_zero())
        .map(|period| {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

    loop {
        select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    debug!(target: "Session Actor", "Stop requested");
                    break;
                }
            },
            Some(msg) = actor.receiver.recv() => {
                actor.handle_message(msg);
                if actor.state == SessionState::Failed {
                    break;
                }
            },
            () = tick(&mut report_timer) => {
                actor.send_report();
            },
        }
    }

    actor.shutdown()
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
