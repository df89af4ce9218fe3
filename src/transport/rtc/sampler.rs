//! Periodic still capture from the video surface.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::session::LiveStatus;
use crate::transport::EventSender;

use super::surface::VideoSurface;

/// Spawns a sampler that emits a still every `period` while the session
/// reports this sender's attempt as Active.
///
/// The task waits while the attempt is Connecting and exits on any other
/// status, including a newer attempt, or once the session drops its
/// status sender.
pub fn spawn_sampler(
    events: EventSender,
    status: watch::Receiver<LiveStatus>,
    surface: Arc<dyn VideoSurface>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let attempt = events.attempt();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            // The session is gone
            if status.has_changed().is_err() {
                break;
            }

            let current = *status.borrow();
            if current.is_active_for(attempt) {
                if let Some(still) = surface.capture_still()
                    && !events.frame(still)
                {
                    break;
                }
            } else if current.attempt != attempt || current.state.is_terminal() {
                break;
            }
        }

        debug!(%attempt, "Frame sampler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::timeout;

    use crate::frame::EncodedFrame;
    use crate::identifiers::AttemptId;
    use crate::session::ConnectionState;
    use crate::transport::TransportEvent;
    use crate::transport::rtc::MediaSample;

    struct StillSurface;

    impl VideoSurface for StillSurface {
        fn present(&self, _sample: &MediaSample) {}

        fn capture_still(&self) -> Option<EncodedFrame> {
            Some(EncodedFrame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
        }

        fn clear(&self) {}
    }

    /// Surface that never has a picture; counts how often it is asked.
    #[derive(Default)]
    struct BlankSurface {
        polls: std::sync::atomic::AtomicUsize,
    }

    impl VideoSurface for BlankSurface {
        fn present(&self, _sample: &MediaSample) {}

        fn capture_still(&self) -> Option<EncodedFrame> {
            self.polls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            None
        }

        fn clear(&self) {}
    }

    fn status(attempt: AttemptId, state: ConnectionState) -> LiveStatus {
        LiveStatus { attempt, state }
    }

    #[tokio::test]
    async fn test_emits_only_while_active() {
        let attempt = AttemptId::next();
        let (tx, mut rx) = unbounded_channel();
        let (status_tx, status_rx) = watch::channel(status(attempt, ConnectionState::Connecting));

        let task = spawn_sampler(
            EventSender::new(attempt, tx),
            status_rx,
            Arc::new(StillSurface),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());

        status_tx.send_replace(status(attempt, ConnectionState::Active));
        let (from, event) = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(from, attempt);
        assert!(matches!(event, TransportEvent::Frame(_)));

        status_tx.send_replace(status(attempt, ConnectionState::Closed));
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_newer_attempt_stops_sampler() {
        let attempt = AttemptId::next();
        let (tx, _rx) = unbounded_channel();
        let (status_tx, status_rx) = watch::channel(status(attempt, ConnectionState::Active));

        let task = spawn_sampler(
            EventSender::new(attempt, tx),
            status_rx,
            Arc::new(StillSurface),
            Duration::from_millis(5),
        );

        status_tx.send_replace(status(AttemptId::next(), ConnectionState::Active));
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropped_status_sender_stops_sampler() {
        let attempt = AttemptId::next();
        let (tx, _rx) = unbounded_channel();
        let (status_tx, status_rx) = watch::channel(status(attempt, ConnectionState::Active));
        let surface = Arc::new(BlankSurface::default());

        let task = spawn_sampler(
            EventSender::new(attempt, tx),
            status_rx,
            surface.clone(),
            Duration::from_millis(5),
        );
        while surface.polls.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(status_tx);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
}
