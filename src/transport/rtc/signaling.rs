//! WebRTC signaling client.
//!
//! One driver task owns the signaling socket and the peer connection:
//!
//! 1. create the peer, open the signaling socket
//! 2. send the offer
//! 3. apply the answer, trickle candidates both ways
//! 4. attach the first remote video track to the surface
//! 5. on shutdown, failure or abort close the peer and the socket together
//!
//! Candidates that arrive before the answer are queued and applied right
//! after it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{from_str, to_string};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::activity::{LogSinkExt, SharedLog};
use crate::error::{Error, Result};
use crate::protocol::{IceCandidate, SignalingMessage};
use crate::session::{LiveStatus, TransportMethod};
use crate::transport::driver::{DriverCommand, DriverHandle};
use crate::transport::{CaptureStrategy, StrategyContext};

use super::peer::{PeerConnection, PeerEvent, PeerFactory, PeerState, RemoteTrack};
use super::sampler::spawn_sampler;
use super::surface::VideoSurface;

// ============================================================================
// Types
// ============================================================================

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// WebRTC-specific inputs for one attempt.
#[derive(Clone)]
pub struct WebRtcContext {
    /// Creates the peer connection.
    pub peer_factory: Arc<dyn PeerFactory>,
    /// Render target for the remote track.
    pub surface: Arc<dyn VideoSurface>,
    /// STUN/TURN URLs.
    pub ice_servers: Vec<String>,
    /// Still sampling cadence.
    pub sample_interval: Duration,
    /// Session status, read by the sampler.
    pub status: watch::Receiver<LiveStatus>,
}

// ============================================================================
// Negotiation
// ============================================================================

/// Offer/answer bookkeeping for one peer.
#[derive(Debug, Default)]
pub(crate) struct Negotiation {
    offer_sent: bool,
    answer_applied: bool,
    pending: Vec<IceCandidate>,
}

impl Negotiation {
    /// Records that the offer went out.
    pub(crate) fn offer_sent(&mut self) {
        self.offer_sent = true;
    }

    /// Number of candidates waiting for the answer.
    pub(crate) fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Applies one inbound signaling message.
    ///
    /// Ordering violations are logged and ignored. Returns an error only
    /// when the peer rejects the answer, which leaves it without a remote
    /// description.
    pub(crate) async fn on_message(
        &mut self,
        message: SignalingMessage,
        peer: &dyn PeerConnection,
        log: &SharedLog,
    ) -> Result<()> {
        match message {
            SignalingMessage::Offer { .. } => {
                log.error(Error::signaling("unexpected offer from server"));
            }

            SignalingMessage::Answer { sdp } => {
                if !self.offer_sent {
                    log.error(Error::signaling("answer received before offer"));
                } else if self.answer_applied {
                    log.error(Error::signaling("duplicate answer ignored"));
                } else {
                    peer.apply_answer(&sdp).await.map_err(|e| {
                        Error::transport_open_failure(
                            TransportMethod::WebRtcStream,
                            format!("remote description rejected: {e}"),
                        )
                    })?;
                    self.answer_applied = true;
                    debug!(queued = self.pending.len(), "Remote description applied");

                    for candidate in std::mem::take(&mut self.pending) {
                        Self::add_candidate(peer, candidate, log).await;
                    }
                }
            }

            SignalingMessage::Candidate { candidate: None } => {
                debug!("Remote end of candidates");
            }

            SignalingMessage::Candidate {
                candidate: Some(candidate),
            } => {
                if candidate.is_end_of_candidates() {
                    debug!("Remote end of candidates");
                } else if !self.offer_sent {
                    log.error(Error::signaling("candidate received before offer"));
                } else if !self.answer_applied {
                    self.pending.push(candidate);
                } else {
                    Self::add_candidate(peer, candidate, log).await;
                }
            }
        }

        Ok(())
    }

    async fn add_candidate(peer: &dyn PeerConnection, candidate: IceCandidate, log: &SharedLog) {
        if let Err(e) = peer.add_remote_candidate(candidate).await {
            log.error(Error::signaling(format!("remote candidate rejected: {e}")));
        }
    }
}

// ============================================================================
// WebRtcSignalingClient
// ============================================================================

/// Peer and helper tasks of one attempt.
///
/// Shared between the driver task and its handle so that an aborted driver
/// still releases them.
#[derive(Default)]
struct Attached {
    peer: Option<Arc<dyn PeerConnection>>,
    playback: Option<JoinHandle<()>>,
    sampler: Option<JoinHandle<()>>,
    released: bool,
}

impl Attached {
    /// Stores the peer. Returns `false` if the set was already released.
    fn hold_peer(shared: &Mutex<Self>, peer: &Arc<dyn PeerConnection>) -> bool {
        let mut attached = shared.lock();
        if !attached.released {
            attached.peer = Some(Arc::clone(peer));
        }
        !attached.released
    }

    fn hold_playback(shared: &Mutex<Self>, task: JoinHandle<()>) {
        let mut attached = shared.lock();
        if attached.released {
            task.abort();
        } else {
            attached.playback = Some(task);
        }
    }

    fn hold_sampler(shared: &Mutex<Self>, task: JoinHandle<()>) {
        let mut attached = shared.lock();
        if attached.released {
            task.abort();
        } else {
            attached.sampler = Some(task);
        }
    }

    /// Takes everything out; later `hold_*` calls are refused.
    fn release(shared: &Mutex<Self>) -> Self {
        let mut attached = shared.lock();
        attached.released = true;
        Self {
            peer: attached.peer.take(),
            playback: attached.playback.take(),
            sampler: attached.sampler.take(),
            released: true,
        }
    }

    fn stop_tasks(&mut self) {
        for task in [self.playback.take(), self.sampler.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

/// WebRTC strategy.
pub struct WebRtcSignalingClient {
    driver: DriverHandle,
    attached: Arc<Mutex<Attached>>,
    surface: Arc<dyn VideoSurface>,
}

impl WebRtcSignalingClient {
    /// Starts negotiation against the signaling endpoint at `url`.
    ///
    /// Failures are reported through the context's event channel.
    #[must_use]
    pub fn spawn(url: Url, ctx: StrategyContext, rtc: WebRtcContext) -> Self {
        let attached = Arc::new(Mutex::new(Attached::default()));
        let surface = Arc::clone(&rtc.surface);

        let guard = ctx.gauge.open();
        let driver = DriverHandle::spawn({
            let attached = Arc::clone(&attached);
            move |commands| async move {
                let _guard = guard;
                Self::run(url, ctx, rtc, attached, commands).await;
            }
        });

        Self {
            driver,
            attached,
            surface,
        }
    }

    async fn run(
        url: Url,
        ctx: StrategyContext,
        rtc: WebRtcContext,
        attached: Arc<Mutex<Attached>>,
        mut commands: mpsc::UnboundedReceiver<DriverCommand>,
    ) {
        let open_failure = |message: String| Error::transport_open_failure(TransportMethod::WebRtcStream, message);

        // Peer first, then the signaling socket
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
        let created = tokio::select! {
            result = rtc.peer_factory.create(&rtc.ice_servers, peer_tx) => result,
            _ = commands.recv() => return,
        };
        let peer = match created {
            Ok(peer) => peer,
            Err(e) => {
                ctx.events.error(open_failure(e.to_string()));
                return;
            }
        };
        if !Attached::hold_peer(&attached, &peer) {
            Self::close_peer(&*peer).await;
            return;
        }

        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = commands.recv() => {
                Self::release(&attached, &*rtc.surface).await;
                return;
            }
        };
        let ws_stream = match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                warn!(%url, error = %e, "Signaling connection failed");
                Self::release(&attached, &*rtc.surface).await;
                ctx.events.error(open_failure(e.to_string()));
                return;
            }
        };

        info!(%url, "Signaling channel connected");
        ctx.log.info("WebRTC signaling channel open");

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut negotiation = Negotiation::default();

        let offer = match peer.create_offer().await {
            Ok(sdp) => SignalingMessage::Offer { sdp },
            Err(e) => {
                ctx.events.error(open_failure(e.to_string()));
                Self::teardown(&attached, &mut ws_write, &*rtc.surface).await;
                return;
            }
        };
        if let Err(e) = Self::send(&mut ws_write, &offer).await {
            ctx.events.error(e);
            Self::teardown(&attached, &mut ws_write, &*rtc.surface).await;
            return;
        }
        negotiation.offer_sent();
        debug!("Offer sent");

        let sampler = spawn_sampler(
            ctx.events.clone(),
            rtc.status.clone(),
            Arc::clone(&rtc.surface),
            rtc.sample_interval,
        );
        Attached::hold_sampler(&attached, sampler);

        let mut track_attached = false;

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let message = match from_str::<SignalingMessage>(&text) {
                                Ok(message) => message,
                                Err(e) => {
                                    ctx.log.error(Error::signaling(format!("unreadable message: {e}")));
                                    continue;
                                }
                            };
                            debug!(kind = message.kind(), "Signaling message received");

                            if let Err(e) = negotiation.on_message(message, &*peer, &ctx.log).await {
                                ctx.events.error(e);
                                break;
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Signaling channel closed by remote");
                            ctx.events.closed();
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "Signaling channel error");
                            ctx.events.error(Error::WebSocket(e));
                            break;
                        }

                        _ => {}
                    }
                }

                event = peer_rx.recv() => {
                    match event {
                        Some(PeerEvent::LocalCandidate(candidate)) => {
                            let message = SignalingMessage::candidate(candidate);
                            if let Err(e) = Self::send(&mut ws_write, &message).await {
                                ctx.events.error(e);
                                break;
                            }
                        }

                        Some(PeerEvent::Track(track)) => {
                            if track_attached {
                                debug!("Ignoring additional remote track");
                            } else {
                                info!("Remote video track attached");
                                track_attached = true;
                                let playback = Self::spawn_playback(track, Arc::clone(&rtc.surface));
                                Attached::hold_playback(&attached, playback);
                            }
                        }

                        Some(PeerEvent::StateChanged(state)) => {
                            debug!(%state, "Peer state changed");
                            match state {
                                PeerState::Connected => {
                                    ctx.events.opened();
                                }
                                PeerState::Failed => {
                                    ctx.events.error(open_failure("peer connection failed".to_string()));
                                    break;
                                }
                                PeerState::Closed => {
                                    ctx.events.closed();
                                    break;
                                }
                                _ => {}
                            }
                        }

                        None => {
                            ctx.events.closed();
                            break;
                        }
                    }
                }

                _ = commands.recv() => {
                    debug!("Closing WebRTC transport");
                    break;
                }
            }
        }

        Self::teardown(&attached, &mut ws_write, &*rtc.surface).await;
        debug!(attempt = %ctx.events.attempt(), "WebRTC driver exited");
    }

    fn spawn_playback(mut track: Box<dyn RemoteTrack>, surface: Arc<dyn VideoSurface>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(sample) = track.next_sample().await {
                surface.present(&sample);
            }
            debug!("Remote track ended");
        })
    }

    async fn send(ws_write: &mut WsSink, message: &SignalingMessage) -> Result<()> {
        let json = to_string(message)?;
        ws_write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    async fn close_peer(peer: &dyn PeerConnection) {
        if let Err(e) = peer.close().await {
            debug!(error = %e, "Peer close failed");
        }
    }

    /// Stops the helper tasks, closes the peer and clears the surface.
    async fn release(attached: &Mutex<Attached>, surface: &dyn VideoSurface) {
        let mut held = Attached::release(attached);
        held.stop_tasks();
        if let Some(peer) = held.peer.take() {
            Self::close_peer(&*peer).await;
        }
        surface.clear();
    }

    /// Closes the peer and the signaling socket as one unit.
    async fn teardown(attached: &Mutex<Attached>, ws_write: &mut WsSink, surface: &dyn VideoSurface) {
        Self::release(attached, surface).await;
        let _ = ws_write.close().await;
    }
}

#[async_trait]
impl CaptureStrategy for WebRtcSignalingClient {
    fn method(&self) -> TransportMethod {
        TransportMethod::WebRtcStream
    }

    async fn shutdown(self: Box<Self>, timeout: Duration) {
        self.driver.shutdown(timeout).await;
        // Non-empty only if the driver was aborted on timeout
        Self::release(&self.attached, &*self.surface).await;
    }

    fn abort(&self) {
        self.driver.abort();

        let mut held = Attached::release(&self.attached);
        held.stop_tasks();
        self.surface.clear();

        let Some(peer) = held.peer.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { Self::close_peer(&*peer).await });
            }
            Err(_) => warn!("No runtime left to close the peer connection"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::activity::ActivityLog;

    #[derive(Default)]
    struct RecordingPeer {
        answers: Mutex<Vec<String>>,
        candidates: Mutex<Vec<String>>,
        reject_answer: bool,
    }

    #[async_trait]
    impl PeerConnection for RecordingPeer {
        async fn create_offer(&self) -> Result<String> {
            Ok("v=0".into())
        }

        async fn apply_answer(&self, sdp: &str) -> Result<()> {
            if self.reject_answer {
                return Err(Error::peer("bad sdp"));
            }
            self.answers.lock().push(sdp.to_string());
            Ok(())
        }

        async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
            self.candidates.lock().push(candidate.candidate);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn candidate(line: &str) -> SignalingMessage {
        SignalingMessage::candidate(IceCandidate {
            candidate: line.into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        })
    }

    fn answer() -> SignalingMessage {
        SignalingMessage::Answer { sdp: "v=0".into() }
    }

    #[tokio::test]
    async fn test_candidates_queued_until_answer() {
        let peer = RecordingPeer::default();
        let log = ActivityLog::new().shared();
        let mut negotiation = Negotiation::default();
        negotiation.offer_sent();

        negotiation.on_message(candidate("candidate:1"), &peer, &log).await.unwrap();
        negotiation.on_message(candidate("candidate:2"), &peer, &log).await.unwrap();
        assert_eq!(negotiation.pending_candidates(), 2);
        assert!(peer.candidates.lock().is_empty());

        negotiation.on_message(answer(), &peer, &log).await.unwrap();
        assert_eq!(negotiation.pending_candidates(), 0);
        assert_eq!(*peer.candidates.lock(), vec!["candidate:1", "candidate:2"]);

        negotiation.on_message(candidate("candidate:3"), &peer, &log).await.unwrap();
        assert_eq!(peer.candidates.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_answer_ignored() {
        let peer = RecordingPeer::default();
        let log = ActivityLog::new();
        let shared = log.shared();
        let mut negotiation = Negotiation::default();
        negotiation.offer_sent();

        negotiation.on_message(answer(), &peer, &shared).await.unwrap();
        negotiation.on_message(answer(), &peer, &shared).await.unwrap();

        assert_eq!(peer.answers.lock().len(), 1);
        assert!(log.contains("duplicate answer"));
    }

    #[tokio::test]
    async fn test_answer_before_offer_is_violation() {
        let peer = RecordingPeer::default();
        let log = ActivityLog::new();
        let shared = log.shared();
        let mut negotiation = Negotiation::default();

        negotiation.on_message(answer(), &peer, &shared).await.unwrap();
        negotiation.on_message(candidate("candidate:1"), &peer, &shared).await.unwrap();

        assert!(peer.answers.lock().is_empty());
        assert_eq!(negotiation.pending_candidates(), 0);
        assert_eq!(log.error_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_answer_fails_transport() {
        let peer = RecordingPeer {
            reject_answer: true,
            ..Default::default()
        };
        let log = ActivityLog::new().shared();
        let mut negotiation = Negotiation::default();
        negotiation.offer_sent();

        let result = negotiation.on_message(answer(), &peer, &log).await;
        assert!(matches!(result, Err(Error::TransportOpenFailure { .. })));
    }

    #[tokio::test]
    async fn test_end_of_candidates_is_ignored() {
        let peer = RecordingPeer::default();
        let log = ActivityLog::new();
        let shared = log.shared();
        let mut negotiation = Negotiation::default();
        negotiation.offer_sent();

        negotiation
            .on_message(SignalingMessage::Candidate { candidate: None }, &peer, &shared)
            .await
            .unwrap();
        negotiation.on_message(candidate(""), &peer, &shared).await.unwrap();

        assert_eq!(negotiation.pending_candidates(), 0);
        assert_eq!(log.error_count(), 0);
    }
}
