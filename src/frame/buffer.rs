//! Latest-frame slot shared between a live transport and analysis.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::EncodedFrame;

// ============================================================================
// FrameCaptureBuffer
// ============================================================================

/// Holds at most one frame: the most recent one.
///
/// Older frames are overwritten, never queued. Cloning yields another
/// handle to the same slot, so the capture session can write while the
/// analysis coordinator reads.
#[derive(Clone, Default)]
pub struct FrameCaptureBuffer {
    slot: Arc<Mutex<Option<EncodedFrame>>>,
}

impl FrameCaptureBuffer {
    /// Creates an empty buffer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame.
    pub fn set(&self, frame: EncodedFrame) {
        *self.slot.lock() = Some(frame);
    }

    /// Returns the current frame, if any.
    #[must_use]
    pub fn get(&self) -> Option<EncodedFrame> {
        self.slot.lock().clone()
    }

    /// Drops the current frame.
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    /// Returns `true` if no frame is held.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl fmt::Debug for FrameCaptureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCaptureBuffer")
            .field("empty", &self.is_empty())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn frame(byte: u8) -> EncodedFrame {
        EncodedFrame::jpeg(vec![byte])
    }

    fn held_byte(buffer: &FrameCaptureBuffer) -> Option<u8> {
        buffer
            .get()
            .map(|f| f.to_image_bytes().unwrap()[0])
    }

    #[test]
    fn test_empty_after_clear() {
        let buffer = FrameCaptureBuffer::new();
        buffer.set(frame(1));
        buffer.clear();

        assert!(buffer.get().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_get_returns_set_frame() {
        let buffer = FrameCaptureBuffer::new();
        buffer.set(frame(7));
        assert_eq!(held_byte(&buffer), Some(7));
    }

    #[test]
    fn test_second_set_overwrites() {
        let buffer = FrameCaptureBuffer::new();
        buffer.set(frame(1));
        buffer.set(frame(2));
        assert_eq!(held_byte(&buffer), Some(2));
    }

    #[test]
    fn test_clones_share_slot() {
        let writer = FrameCaptureBuffer::new();
        let reader = writer.clone();
        writer.set(frame(3));
        assert_eq!(held_byte(&reader), Some(3));
    }

    proptest! {
        #[test]
        fn prop_holds_only_last_frame(bytes in proptest::collection::vec(any::<u8>(), 1..64)) {
            let buffer = FrameCaptureBuffer::new();
            for b in &bytes {
                buffer.set(frame(*b));
            }
            prop_assert_eq!(held_byte(&buffer), bytes.last().copied());
        }
    }
}
