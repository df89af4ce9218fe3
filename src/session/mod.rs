//! Capture session lifecycle.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | Transport method, connection state, live status |
//! | `core` | [`CaptureSession`] state machine |
//! | `builder` | [`CaptureSessionBuilder`] |

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session state machine.
pub mod core;

/// State types.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::CaptureSessionBuilder;
pub use core::CaptureSession;
pub use state::{ConnectionState, LiveStatus, TransportMethod};
