//! End-to-end capture scenarios against a local capture server.
//!
//! The server answers `/ws/webcam` with a scripted push stream and
//! `/webrtc` with a scripted signaling exchange. WebRTC media is replaced by
//! an in-process peer and surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

use imagoiq_capture::protocol::IceCandidate;
use imagoiq_capture::transport::rtc::{MediaSample, PeerConnection, PeerEvent, PeerEventSender, PeerState};
use imagoiq_capture::{
    ActivityLog, CaptureConfig, CaptureSession, ConnectionState, EncodedFrame, FramePayload, PeerFactory,
    Result, TransportMethod, VideoSurface,
};

// ============================================================================
// Capture Server
// ============================================================================

const FRAMES: [&str; 3] = [
    "data:image/jpeg;base64,AQID",
    "data:image/jpeg;base64,BAUG",
    "data:image/jpeg;base64,BwgJ",
];

#[derive(Clone, Copy)]
enum StreamScript {
    /// Sends the three frames, then waits for the client to leave.
    ThreeFrames,
    /// Sends one frame, then reports a camera error.
    CameraBusy,
    /// Sends a frame every 10 ms until the client leaves.
    Endless,
    /// Sends the three frames, then closes the socket.
    HangUp,
}

/// Signaling messages the server received, in order.
type Received = Arc<Mutex<Vec<Value>>>;

struct CaptureServer {
    base: String,
    signaling: Received,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl CaptureServer {
    async fn start(script: StreamScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let signaling = Received::default();
        let connections = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn({
            let signaling = Arc::clone(&signaling);
            let connections = Arc::clone(&connections);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, script, Arc::clone(&signaling)));
                }
            }
        });

        Self {
            base,
            signaling,
            connections,
            task,
        }
    }

    fn config(&self) -> CaptureConfig {
        CaptureConfig::new()
            .with_server(self.base.clone())
            .with_sample_interval(Duration::from_millis(20))
            .with_shutdown_timeout(Duration::from_secs(2))
    }
}

impl Drop for CaptureServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, script: StreamScript, signaling: Received) {
    let mut path = String::new();
    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        path = request.uri().path().to_owned();
        Ok(response)
    };
    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    match path.as_str() {
        "/ws/webcam" => push_stream(ws, script).await,
        "/webrtc" => signal(ws, signaling).await,
        _ => {}
    }
}

async fn push_stream(mut ws: WebSocketStream<TcpStream>, script: StreamScript) {
    match script {
        StreamScript::ThreeFrames | StreamScript::HangUp => {
            for frame in FRAMES {
                let text = json!({ "frame": frame }).to_string();
                if ws.send(Message::text(text)).await.is_err() {
                    return;
                }
            }
        }
        StreamScript::CameraBusy => {
            let _ = ws.send(Message::text(json!({ "frame": FRAMES[0] }).to_string())).await;
            let _ = ws.send(Message::text(json!({ "error": "camera busy" }).to_string())).await;
        }
        StreamScript::Endless => loop {
            let text = json!({ "frame": FRAMES[0] }).to_string();
            if ws.send(Message::text(text)).await.is_err() {
                return;
            }
            tokio::select! {
                () = sleep(Duration::from_millis(10)) => {}
                msg = ws.next() => if !matches!(msg, Some(Ok(Message::Text(_) | Message::Ping(_)))) {
                    return;
                },
            }
        },
    }

    if matches!(script, StreamScript::HangUp) {
        let _ = ws.close(None).await;
        return;
    }

    while let Some(Ok(msg)) = ws.next().await {
        if msg.is_close() {
            break;
        }
    }
}

/// Answers the offer, trickles one candidate and records what the client
/// sends.
async fn signal(mut ws: WebSocketStream<TcpStream>, signaling: Received) {
    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else {
            if msg.is_close() {
                break;
            }
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let is_offer = value["type"] == "offer";
        signaling.lock().push(value);

        if is_offer {
            let answer = json!({ "type": "answer", "sdp": "v=0\r\ns=answer\r\n" });
            let candidate = json!({
                "type": "candidate",
                "candidate": {
                    "candidate": "candidate:1 1 udp 2122260223 127.0.0.1 40000 typ host",
                    "sdpMid": "0",
                    "sdpMLineIndex": 0,
                }
            });
            let _ = ws.send(Message::text(answer.to_string())).await;
            let _ = ws.send(Message::text(candidate.to_string())).await;
        }
    }
}

// ============================================================================
// In-process WebRTC Peer
// ============================================================================

#[derive(Default)]
struct LoopbackFactory {
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl PeerFactory for LoopbackFactory {
    async fn create(&self, _ice_servers: &[String], events: PeerEventSender) -> Result<Arc<dyn PeerConnection>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(LoopbackPeer {
            events,
            answered: Mutex::new(false),
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Trickles one local candidate with the offer and reports Connected once
/// a remote candidate arrives after the answer.
struct LoopbackPeer {
    events: PeerEventSender,
    answered: Mutex<bool>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl PeerConnection for LoopbackPeer {
    async fn create_offer(&self) -> Result<String> {
        let _ = self.events.send(PeerEvent::LocalCandidate(IceCandidate {
            candidate: "candidate:2 1 udp 2122260223 127.0.0.1 50000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }));
        Ok("v=0\r\ns=offer\r\nm=video 9 UDP/TLS/RTP/SAVPF 102\r\na=recvonly\r\n".into())
    }

    async fn apply_answer(&self, _sdp: &str) -> Result<()> {
        *self.answered.lock() = true;
        Ok(())
    }

    async fn add_remote_candidate(&self, _candidate: IceCandidate) -> Result<()> {
        if *self.answered.lock() {
            let _ = self.events.send(PeerEvent::StateChanged(PeerState::Connected));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Surface that always has a picture.
#[derive(Default)]
struct StillSurface {
    cleared: AtomicUsize,
}

const STILL: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

impl VideoSurface for StillSurface {
    fn present(&self, _sample: &MediaSample) {}

    fn capture_still(&self) -> Option<EncodedFrame> {
        Some(EncodedFrame::jpeg(STILL))
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

/// Surface that never has a picture and counts still requests.
#[derive(Default)]
struct BlankSurface {
    polls: AtomicUsize,
}

impl VideoSurface for BlankSurface {
    fn present(&self, _sample: &MediaSample) {}

    fn capture_still(&self) -> Option<EncodedFrame> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        None
    }

    fn clear(&self) {}
}

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    session: CaptureSession,
    log: ActivityLog,
    factory: Arc<LoopbackFactory>,
    surface: Arc<StillSurface>,
}

fn harness(server: &CaptureServer) -> Harness {
    let log = ActivityLog::new();
    let factory = Arc::new(LoopbackFactory::default());
    let surface = Arc::new(StillSurface::default());

    let session = CaptureSession::builder()
        .config(server.config())
        .log(log.shared())
        .peer_factory(factory.clone())
        .surface(surface.clone())
        .build()
        .unwrap();

    Harness {
        session,
        log,
        factory,
        surface,
    }
}

/// Pumps events until `done` holds or the session leaves the live states.
async fn pump_until(session: &mut CaptureSession, mut done: impl FnMut(&CaptureSession) -> bool) {
    timeout(Duration::from_secs(10), async {
        while !done(session) && session.state().is_live() {
            session.process_next().await;
        }
    })
    .await
    .expect("capture scenario timed out");
}

fn buffered_payload(session: &CaptureSession) -> Option<FramePayload> {
    session.buffer().get().map(|frame| frame.payload().clone())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_push_stream_keeps_latest_frame() {
    let server = CaptureServer::start(StreamScript::ThreeFrames).await;
    let Harness {
        mut session, log, ..
    } = harness(&server);

    session.start(TransportMethod::WebSocketStream).unwrap();
    let last = FramePayload::DataUri(FRAMES[2].to_string());
    pump_until(&mut session, |s| buffered_payload(s).as_ref() == Some(&last)).await;

    assert_eq!(session.state(), ConnectionState::Active);
    assert_eq!(
        log.messages()
            .iter()
            .filter(|m| m.contains("connection established"))
            .count(),
        1
    );
    assert_eq!(log.error_count(), 0);

    session.stop().await;
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(session.buffer().is_empty());
    assert_eq!(session.open_transports(), 0);
}

#[tokio::test]
async fn test_server_error_ends_attempt() {
    let server = CaptureServer::start(StreamScript::CameraBusy).await;
    let Harness {
        mut session, log, ..
    } = harness(&server);

    session.start(TransportMethod::WebSocketStream).unwrap();
    pump_until(&mut session, |_| false).await;

    assert_eq!(session.state(), ConnectionState::Failed);
    assert!(log.contains("camera busy"));
    assert!(session.buffer().is_empty());
    assert_eq!(session.open_transports(), 0);
}

#[tokio::test]
async fn test_webrtc_negotiates_and_samples_stills() {
    let server = CaptureServer::start(StreamScript::ThreeFrames).await;
    let Harness {
        mut session,
        log,
        factory,
        surface,
    } = harness(&server);

    session.start(TransportMethod::WebRtcStream).unwrap();
    pump_until(&mut session, |s| !s.buffer().is_empty()).await;

    assert_eq!(session.state(), ConnectionState::Active);
    assert!(log.contains("WebRTC connection established"));
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);

    let frame = session.buffer().get().unwrap();
    assert_eq!(frame.to_image_bytes().unwrap().as_ref(), STILL);

    // Offer first, then the trickled local candidate
    let received = server.signaling.lock().clone();
    assert_eq!(received[0]["type"], "offer");
    assert!(received[0]["sdp"].as_str().unwrap().contains("m=video"));
    assert!(
        received
            .iter()
            .any(|m| m["type"] == "candidate" && m["candidate"]["sdpMid"] == "0")
    );

    session.stop().await;
    assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    assert!(surface.cleared.load(Ordering::SeqCst) >= 1);
    assert!(session.buffer().is_empty());
    assert_eq!(session.open_transports(), 0);
}

#[tokio::test]
async fn test_switching_never_overlaps_transports() {
    let server = CaptureServer::start(StreamScript::Endless).await;
    let Harness {
        mut session, log, ..
    } = harness(&server);

    session.start(TransportMethod::WebSocketStream).unwrap();
    pump_until(&mut session, |s| !s.buffer().is_empty()).await;
    assert!(session.open_transports() <= 1);

    let first = session.attempt();
    session.switch_method(TransportMethod::WebRtcStream).await.unwrap();
    assert!(session.open_transports() <= 1);
    assert_ne!(session.attempt(), first);
    assert_eq!(session.method(), TransportMethod::WebRtcStream);
    assert_eq!(session.state(), ConnectionState::Connecting);

    pump_until(&mut session, |s| {
        assert!(s.open_transports() <= 1);
        !s.buffer().is_empty()
    })
    .await;

    // Only WebRTC stills reach the buffer after the switch
    let frame = session.buffer().get().unwrap();
    assert_eq!(frame.mime(), "image/jpeg");
    assert!(matches!(frame.payload(), FramePayload::Binary { .. }));

    session.switch_method(TransportMethod::WebSocketStream).await.unwrap();
    assert!(session.open_transports() <= 1);
    pump_until(&mut session, |s| !s.buffer().is_empty()).await;
    assert!(matches!(
        buffered_payload(&session),
        Some(FramePayload::DataUri(_))
    ));

    session.stop().await;
    assert_eq!(session.open_transports(), 0);
    assert!(log.contains("WebSocket stopped"));
    assert!(log.contains("WebRTC stopped"));
    assert!(server.connections.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = CaptureServer::start(StreamScript::ThreeFrames).await;
    let Harness {
        mut session, log, ..
    } = harness(&server);

    session.start(TransportMethod::WebSocketStream).unwrap();
    pump_until(&mut session, |s| s.state() == ConnectionState::Active).await;

    session.stop().await;
    let entries = log.len();
    session.stop().await;
    session.stop().await;

    assert_eq!(session.state(), ConnectionState::Closed);
    assert_eq!(log.len(), entries);
    assert_eq!(session.open_transports(), 0);
}

#[tokio::test]
async fn test_remote_close_ends_session() {
    let server = CaptureServer::start(StreamScript::HangUp).await;
    let Harness {
        mut session, log, ..
    } = harness(&server);

    session.start(TransportMethod::WebSocketStream).unwrap();
    pump_until(&mut session, |_| false).await;

    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(log.contains("WebSocket disconnected"));
    assert_eq!(log.error_count(), 0);
    assert!(session.buffer().is_empty());
    assert_eq!(session.open_transports(), 0);
}

#[tokio::test]
async fn test_dropping_live_webrtc_session_releases_peer() {
    let server = CaptureServer::start(StreamScript::ThreeFrames).await;
    let factory = Arc::new(LoopbackFactory::default());
    let surface = Arc::new(BlankSurface::default());

    let mut session = CaptureSession::builder()
        .config(server.config())
        .peer_factory(factory.clone())
        .surface(surface.clone())
        .build()
        .unwrap();
    let mut status = session.subscribe();

    session.start(TransportMethod::WebRtcStream).unwrap();
    pump_until(&mut session, |s| s.state() == ConnectionState::Active).await;
    assert_eq!(session.state(), ConnectionState::Active);

    // Wait for the sampler to poll the empty surface
    timeout(Duration::from_secs(5), async {
        while surface.polls.load(Ordering::SeqCst) == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(session.buffer().is_empty());

    drop(session);
    assert_eq!(status.borrow_and_update().state, ConnectionState::Closed);

    timeout(Duration::from_secs(5), async {
        while factory.closed.load(Ordering::SeqCst) == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let polls = surface.polls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(surface.polls.load(Ordering::SeqCst), polls);
    assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
}
