//! Still-image analysis.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `file` | [`ImageFile`] payloads |
//! | `service` | [`AnalysisService`] contract and HTTP client |
//! | `coordinator` | [`AnalysisRequestCoordinator`] sequencing |

// ============================================================================
// Submodules
// ============================================================================

/// Upload-then-analyze sequencing.
pub mod coordinator;

/// Image payloads.
pub mod file;

/// Remote service contract.
pub mod service;

// ============================================================================
// Re-exports
// ============================================================================

pub use coordinator::{AnalysisOutcome, AnalysisRequestCoordinator, AnalysisSource};
pub use file::{ImageFile, LIVE_FRAME_NAME};
pub use service::{AnalysisService, HttpAnalysisService};
