//! Capture session state machine.
//!
//! ```text
//!            start                 opened
//!  Idle ──────────────► Connecting ───────► Active
//!   ▲                       │                 │
//!   │                       │ error           │ stop / closed
//!   │                       ▼                 ▼
//!   └──── start ──────── Failed            Closed ──── start ───► Connecting
//! ```
//!
//! The session owns at most one [`CaptureStrategy`]. Every exit from a live
//! state awaits the strategy's shutdown before the next `start` can run, so
//! two transports never overlap.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

use crate::activity::{LogSinkExt, SharedLog};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::frame::{FrameCaptureBuffer, FrameRateMonitor};
use crate::identifiers::AttemptId;
use crate::transport::rtc::{PeerFactory, VideoSurface};
use crate::transport::{
    CaptureStrategy, EventReceiver, EventSender, StrategyContext, TransportEvent, TransportGauge,
    WebRtcContext, WebRtcSignalingClient, WebSocketFrameStream,
};

use super::builder::CaptureSessionBuilder;
use super::state::{ConnectionState, LiveStatus, TransportMethod};

// ============================================================================
// CaptureSession
// ============================================================================

/// Live capture session.
///
/// Drive it by awaiting [`next_event`](Self::next_event) and applying each
/// event with [`handle_event`](Self::handle_event), or both at once with
/// [`process_next`](Self::process_next).
///
/// # Example
///
/// ```no_run
/// use imagoiq_capture::{CaptureSession, TransportMethod};
///
/// # async fn example() -> imagoiq_capture::Result<()> {
/// let mut session = CaptureSession::builder().build()?;
/// session.start(TransportMethod::WebSocketStream)?;
///
/// while session.state().is_live() {
///     session.process_next().await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct CaptureSession {
    config: CaptureConfig,
    log: SharedLog,
    buffer: FrameCaptureBuffer,
    monitor: FrameRateMonitor,

    method: TransportMethod,
    state: ConnectionState,
    attempt: AttemptId,
    strategy: Option<Box<dyn CaptureStrategy>>,

    events_tx: mpsc::UnboundedSender<(AttemptId, TransportEvent)>,
    events_rx: EventReceiver,
    status: watch::Sender<LiveStatus>,
    gauge: TransportGauge,

    peer_factory: Arc<dyn PeerFactory>,
    surface: Arc<dyn VideoSurface>,
}

// ============================================================================
// Construction & Accessors
// ============================================================================

impl CaptureSession {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> CaptureSessionBuilder {
        CaptureSessionBuilder::new()
    }

    pub(crate) fn new(
        config: CaptureConfig,
        log: SharedLog,
        buffer: FrameCaptureBuffer,
        peer_factory: Arc<dyn PeerFactory>,
        surface: Arc<dyn VideoSurface>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(LiveStatus::IDLE);

        Self {
            method: config.transport,
            config,
            log,
            buffer,
            monitor: FrameRateMonitor::new(),
            state: ConnectionState::Idle,
            attempt: AttemptId::NONE,
            strategy: None,
            events_tx,
            events_rx,
            status,
            gauge: TransportGauge::new(),
            peer_factory,
            surface,
        }
    }

    /// Current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Selected transport method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> TransportMethod {
        self.method
    }

    /// Current attempt, or [`AttemptId::NONE`] before the first start.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Latest-frame buffer fed by the active transport.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &FrameCaptureBuffer {
        &self.buffer
    }

    /// Activity log sink.
    #[inline]
    #[must_use]
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Number of transports that still hold connection objects.
    #[inline]
    #[must_use]
    pub fn open_transports(&self) -> usize {
        self.gauge.count()
    }

    /// Subscribes to `{attempt, state}` updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LiveStatus> {
        self.status.subscribe()
    }
}

// ============================================================================
// Commands
// ============================================================================

impl CaptureSession {
    /// Starts a capture attempt with `method`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] while Connecting or Active. The error is
    /// logged and nothing else changes.
    pub fn start(&mut self, method: TransportMethod) -> Result<()> {
        if !self.state.can_start() {
            let err = Error::invalid_transition("start", self.state);
            self.log.error(&err);
            return Err(err);
        }

        let url = match self.config.transport_url(method) {
            Ok(url) => url,
            Err(e) => {
                self.log.error(&e);
                return Err(e);
            }
        };

        self.method = method;
        self.attempt = AttemptId::next();
        self.monitor.reset();
        self.set_state(ConnectionState::Connecting);

        let ctx = StrategyContext {
            events: EventSender::new(self.attempt, self.events_tx.clone()),
            log: Arc::clone(&self.log),
            gauge: self.gauge.clone(),
        };

        let strategy: Box<dyn CaptureStrategy> = match method {
            TransportMethod::WebSocketStream => Box::new(WebSocketFrameStream::spawn(url, ctx)),
            TransportMethod::WebRtcStream => {
                let rtc = WebRtcContext {
                    peer_factory: Arc::clone(&self.peer_factory),
                    surface: Arc::clone(&self.surface),
                    ice_servers: self.config.ice_servers.clone(),
                    sample_interval: self.config.sample_interval(),
                    status: self.status.subscribe(),
                };
                Box::new(WebRtcSignalingClient::spawn(url, ctx, rtc))
            }
        };
        self.strategy = Some(strategy);

        info!(attempt = %self.attempt, %method, "Capture started");
        self.log.info(format!("{method} started"));
        Ok(())
    }

    /// Stops the current attempt.
    ///
    /// Waits for the transport to release its connections, clears the
    /// buffer and moves to Closed. No-op unless Connecting or Active.
    pub async fn stop(&mut self) {
        if !self.state.is_live() {
            debug!(state = %self.state, "Stop ignored");
            return;
        }

        self.set_state(ConnectionState::Closed);
        self.teardown().await;
        self.log.info(format!("{} stopped", self.method));
    }

    /// Changes the transport method.
    ///
    /// A live attempt is stopped and a new one started with `method`;
    /// otherwise the method is only recorded for the next start.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`start`](Self::start).
    pub async fn switch_method(&mut self, method: TransportMethod) -> Result<()> {
        if self.state.is_live() {
            self.stop().await;
            self.start(method)
        } else {
            self.method = method;
            debug!(%method, "Transport method selected");
            Ok(())
        }
    }
}

// ============================================================================
// Event Handling
// ============================================================================

impl CaptureSession {
    /// Waits for the next event of the current attempt.
    ///
    /// Cancel safe. Events from earlier attempts are discarded. Pending
    /// forever while no transport is running.
    pub async fn next_event(&mut self) -> TransportEvent {
        loop {
            let Some((attempt, event)) = self.events_rx.recv().await else {
                return std::future::pending().await;
            };

            if attempt == self.attempt {
                return event;
            }
            trace!(%attempt, current = %self.attempt, event = event.name(), "Dropping stale event");
        }
    }

    /// Applies one transport event to the state machine.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    debug!(state = %self.state, "Ignoring opened event");
                    return;
                }
                self.monitor.reset();
                self.set_state(ConnectionState::Active);
                self.log.info(format!("{} connection established", self.method));
            }

            TransportEvent::Frame(frame) => {
                if self.state != ConnectionState::Active {
                    trace!(state = %self.state, "Ignoring frame");
                    return;
                }
                self.buffer.set(frame);
                if let Some(sample) = self.monitor.record_frame() {
                    self.log.info(format!("FPS {}: {:.2}", self.method, sample.fps()));
                }
            }

            TransportEvent::Error(e) => {
                if !self.state.is_live() {
                    debug!(error = %e, state = %self.state, "Ignoring transport error");
                    return;
                }
                self.set_state(ConnectionState::Failed);
                self.log.error(&e);
                self.teardown().await;
            }

            TransportEvent::Closed => {
                if !self.state.is_live() {
                    debug!(state = %self.state, "Ignoring closed event");
                    return;
                }
                self.set_state(ConnectionState::Closed);
                self.log.info(format!("{} disconnected", self.method));
                self.teardown().await;
            }
        }
    }

    /// Waits for the next event, applies it and returns the new state.
    pub async fn process_next(&mut self) -> ConnectionState {
        let event = self.next_event().await;
        self.handle_event(event).await;
        self.state
    }
}

// ============================================================================
// Internals
// ============================================================================

impl CaptureSession {
    fn set_state(&mut self, state: ConnectionState) {
        debug!(attempt = %self.attempt, from = %self.state, to = %state, "Session state change");
        self.state = state;
        self.status.send_replace(LiveStatus {
            attempt: self.attempt,
            state,
        });
    }

    /// Shuts the strategy down and forgets anything it produced.
    async fn teardown(&mut self) {
        if let Some(strategy) = self.strategy.take() {
            let method = strategy.method();
            strategy.shutdown(self.config.shutdown_timeout()).await;
            debug!(%method, open = self.gauge.count(), "Transport released");
        }

        self.buffer.clear();
        while self.events_rx.try_recv().is_ok() {}
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(strategy) = self.strategy.take() {
            // Helpers gated on the status must see the attempt end
            self.status.send_replace(LiveStatus {
                attempt: self.attempt,
                state: ConnectionState::Closed,
            });
            strategy.abort();
        }
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("method", &self.method)
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("open_transports", &self.gauge.count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
