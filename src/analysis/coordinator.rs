//! Upload-then-analyze sequencing.
//!
//! One request at a time: a call made while another is in flight fails
//! with [`Error::AnalysisInProgress`] without touching the network.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::activity::{LogEntry, LogLevel, LogSink, LogSinkExt, SharedLog};
use crate::config::Language;
use crate::error::{Error, Result};
use crate::frame::FrameCaptureBuffer;
use crate::identifiers::UploadId;

use super::file::ImageFile;
use super::service::AnalysisService;

// ============================================================================
// Types
// ============================================================================

/// What to analyze.
#[derive(Debug, Clone)]
pub enum AnalysisSource {
    /// A file chosen by the operator.
    File(ImageFile),
    /// The most recent live frame.
    LiveFrame,
}

/// Result of a completed analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// Name the server stored the upload under.
    pub upload: UploadId,
    /// Scene description.
    pub description: String,
}

// ============================================================================
// AnalysisRequestCoordinator
// ============================================================================

/// Sequences upload and analyze calls against an [`AnalysisService`].
pub struct AnalysisRequestCoordinator {
    service: Arc<dyn AnalysisService>,
    buffer: FrameCaptureBuffer,
    log: SharedLog,
    language: Language,
    busy: AtomicBool,
}

impl AnalysisRequestCoordinator {
    /// Creates a coordinator reading live frames from `buffer`.
    #[must_use]
    pub fn new(service: Arc<dyn AnalysisService>, buffer: FrameCaptureBuffer, log: SharedLog) -> Self {
        Self {
            service,
            buffer,
            log,
            language: Language::default(),
            busy: AtomicBool::new(false),
        }
    }

    /// Sets the description language.
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Returns `true` while a request is in flight.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Uploads the image from `source`, then requests its description.
    ///
    /// Every outcome is written to the activity log.
    ///
    /// # Errors
    ///
    /// - [`Error::AnalysisInProgress`] if another call is in flight
    /// - [`Error::NoImageAvailable`] if `source` has no image
    /// - [`Error::UploadRejected`] if the server refuses the upload
    /// - [`Error::Network`] and others from the service
    pub async fn analyze(&self, source: AnalysisSource) -> Result<AnalysisOutcome> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            let err = Error::AnalysisInProgress;
            self.log.error(&err);
            return Err(err);
        };

        let image = match self.resolve(source) {
            Ok(image) => image,
            Err(Error::NoImageAvailable) => {
                self.log.error("no image selected");
                return Err(Error::NoImageAvailable);
            }
            Err(e) => return Err(self.failed(e)),
        };

        match self.run(&image).await {
            Ok(outcome) => {
                info!(upload = %outcome.upload, "Analysis completed");
                self.log.info("Analysis completed");
                Ok(outcome)
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    fn resolve(&self, source: AnalysisSource) -> Result<ImageFile> {
        match source {
            AnalysisSource::File(image) if image.is_empty() => Err(Error::NoImageAvailable),
            AnalysisSource::File(image) => Ok(image),
            AnalysisSource::LiveFrame => {
                let frame = self.buffer.get().ok_or(Error::NoImageAvailable)?;
                ImageFile::from_frame(&frame)
            }
        }
    }

    async fn run(&self, image: &ImageFile) -> Result<AnalysisOutcome> {
        let upload = self.service.upload(image).await?.into_upload_id()?;
        debug!(%upload, "Upload accepted");

        let description = self
            .service
            .analyze(&upload, self.language)
            .await?
            .into_description()?;

        Ok(AnalysisOutcome { upload, description })
    }

    fn failed(&self, e: Error) -> Error {
        warn!(error = %e, "Analysis failed");
        self.log
            .append(LogEntry::new(LogLevel::Error, format!("Error during analysis: {e}")));
        e
    }
}

impl fmt::Debug for AnalysisRequestCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequestCoordinator")
            .field("language", &self.language)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BusyGuard
// ============================================================================

/// Holds the in-flight flag; clears it on drop.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
