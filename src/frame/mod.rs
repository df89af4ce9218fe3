//! Frame handling shared by both transports.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `buffer` | Latest-frame slot ([`FrameCaptureBuffer`]) |
//! | `encoded` | Encoded still frames ([`EncodedFrame`]) |
//! | `rate` | Fixed-window FPS estimator ([`FrameRateMonitor`]) |

// ============================================================================
// Submodules
// ============================================================================

/// Latest-frame slot.
pub mod buffer;

/// Encoded still frames.
pub mod encoded;

/// Frames-per-second measurement.
pub mod rate;

// ============================================================================
// Re-exports
// ============================================================================

pub use buffer::FrameCaptureBuffer;
pub use encoded::{EncodedFrame, FramePayload, JPEG_DATA_URI_PREFIX, JPEG_MIME};
pub use rate::{FPS_WINDOW, FpsSample, FrameRateMonitor};
