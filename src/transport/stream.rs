//! JPEG push stream over WebSocket.
//!
//! The server pushes one JSON message per frame. The driver task translates
//! socket activity into [`TransportEvent`](super::TransportEvent)s:
//!
//! | Socket activity | Event |
//! |-----------------|-------|
//! | handshake complete | `Opened` |
//! | `{"frame": "data:image/jpeg;base64,..."}` | `Frame` |
//! | `{"error": "..."}` | `Error`, then the socket is closed |
//! | close frame / end of stream | `Closed` |
//! | socket error | `Error` |
//!
//! Any other message is logged and dropped; the previous frame stays
//! current.

// ============================================================================
// Imports
// ============================================================================

use std::ops::ControlFlow;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::activity::LogSinkExt;
use crate::error::Error;
use crate::protocol::StreamPayload;
use crate::session::TransportMethod;

use super::driver::{DriverCommand, DriverHandle};
use super::{CaptureStrategy, StrategyContext};

// ============================================================================
// Constants
// ============================================================================

/// Logged when a message carries no usable frame.
const MALFORMED_FRAME_LOG: &str = "invalid or missing frame";

// ============================================================================
// WebSocketFrameStream
// ============================================================================

/// Push-stream strategy.
pub struct WebSocketFrameStream {
    driver: DriverHandle,
}

impl WebSocketFrameStream {
    /// Connects to `url` in a background task.
    ///
    /// Failures are reported through the context's event channel, never
    /// returned.
    #[must_use]
    pub fn spawn(url: Url, ctx: StrategyContext) -> Self {
        let guard = ctx.gauge.open();
        let driver = DriverHandle::spawn(move |commands| async move {
            let _guard = guard;
            Self::run(url, ctx, commands).await;
        });
        Self { driver }
    }

    async fn run(url: Url, ctx: StrategyContext, mut commands: mpsc::UnboundedReceiver<DriverCommand>) {
        debug!(%url, attempt = %ctx.events.attempt(), "Connecting frame stream");

        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = commands.recv() => {
                debug!("Frame stream cancelled before connecting");
                return;
            }
        };

        let ws_stream = match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                warn!(%url, error = %e, "Frame stream connection failed");
                ctx.events.error(Error::transport_open_failure(
                    TransportMethod::WebSocketStream,
                    e.to_string(),
                ));
                return;
            }
        };

        info!(%url, "Frame stream connected");
        ctx.events.opened();

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if Self::handle_text(&text, &ctx).is_break() {
                                let _ = ws_write.close().await;
                                break;
                            }
                        }

                        Some(Ok(Message::Binary(_))) => {
                            ctx.log.error(MALFORMED_FRAME_LOG);
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Frame stream closed by remote");
                            ctx.events.closed();
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "Frame stream error");
                            ctx.events.error(Error::WebSocket(e));
                            break;
                        }

                        // Ping/Pong are answered by tungstenite
                        _ => {}
                    }
                }

                _ = commands.recv() => {
                    debug!("Closing frame stream");
                    let _ = ws_write.close().await;
                    break;
                }
            }
        }

        debug!(attempt = %ctx.events.attempt(), "Frame stream driver exited");
    }

    /// Handles one text message. Breaks when the stream must end.
    fn handle_text(text: &str, ctx: &StrategyContext) -> ControlFlow<()> {
        match StreamPayload::parse(text) {
            StreamPayload::Frame(frame) => {
                if ctx.events.frame(frame) {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }

            StreamPayload::ServerError(message) => {
                warn!(%message, "Frame server reported an error");
                ctx.events.error(Error::server_reported(message));
                ControlFlow::Break(())
            }

            StreamPayload::Malformed(e) => {
                debug!(error = %e, "Dropping malformed stream message");
                ctx.log.error(MALFORMED_FRAME_LOG);
                ControlFlow::Continue(())
            }
        }
    }
}

#[async_trait]
impl CaptureStrategy for WebSocketFrameStream {
    fn method(&self) -> TransportMethod {
        TransportMethod::WebSocketStream
    }

    async fn shutdown(self: Box<Self>, timeout: Duration) {
        self.driver.shutdown(timeout).await;
    }

    fn abort(&self) {
        self.driver.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
