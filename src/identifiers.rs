//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Source | Description |
//! |------|--------|-------------|
//! | [`AttemptId`] | Local counter | One capture attempt (start → teardown) |
//! | [`UploadId`] | Upload endpoint | Filename returned by `/upload-image/` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// AttemptId
// ============================================================================

/// Counter backing [`AttemptId::next`].
static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

/// Identifier of one capture attempt.
///
/// Every `start` gets a fresh id; transport events carry the id of the
/// attempt that produced them so late events from a torn-down strategy can
/// be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    /// Placeholder id used before the first attempt.
    pub const NONE: Self = Self(0);

    /// Allocates the next attempt id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// UploadId
// ============================================================================

/// Server-side name of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Wraps a filename returned by the upload endpoint.
    #[inline]
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self(filename.into())
    }

    /// Returns the filename.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
