//! Operator console.
//!
//! Ties a [`CaptureSession`] and an [`AnalysisRequestCoordinator`] together
//! around one shared frame buffer and activity log, and keeps the operator's
//! selected file and last result.
//!
//! # Example
//!
//! ```no_run
//! use imagoiq_capture::{CaptureConfig, Console};
//!
//! # async fn example() -> imagoiq_capture::Result<()> {
//! let mut console = Console::new(CaptureConfig::default())?;
//! console.toggle_capture().await?;
//!
//! // Let a few frames arrive
//! for _ in 0..30 {
//!     console.pump().await;
//! }
//!
//! let outcome = console.analyze().await?;
//! println!("{}", outcome.description);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::activity::{ActivityLog, LogSinkExt};
use crate::analysis::{
    AnalysisOutcome, AnalysisRequestCoordinator, AnalysisService, AnalysisSource, HttpAnalysisService,
    ImageFile,
};
use crate::config::CaptureConfig;
use crate::error::Result;
use crate::frame::FrameCaptureBuffer;
use crate::session::{CaptureSession, ConnectionState, TransportMethod};

// ============================================================================
// Console
// ============================================================================

/// Operator-facing facade over capture and analysis.
#[derive(Debug)]
pub struct Console {
    session: CaptureSession,
    coordinator: Arc<AnalysisRequestCoordinator>,
    log: ActivityLog,
    selected: Option<ImageFile>,
    last_result: Option<String>,
}

impl Console {
    /// Creates a console talking HTTP to the configured server.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let service = Arc::new(HttpAnalysisService::new(config.clone())?);
        Self::with_service(config, service)
    }

    /// Creates a console with a custom analysis service.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn with_service(config: CaptureConfig, service: Arc<dyn AnalysisService>) -> Result<Self> {
        let log = ActivityLog::new();
        let buffer = FrameCaptureBuffer::new();
        let language = config.language;

        let session = CaptureSession::builder()
            .config(config)
            .log(log.shared())
            .buffer(buffer.clone())
            .build()?;
        let coordinator = AnalysisRequestCoordinator::new(service, buffer, log.shared()).with_language(language);

        Ok(Self::from_parts(session, coordinator, log))
    }

    /// Assembles a console from prebuilt parts.
    ///
    /// `session` and `coordinator` should share a frame buffer and write to
    /// `log`.
    #[must_use]
    pub fn from_parts(session: CaptureSession, coordinator: AnalysisRequestCoordinator, log: ActivityLog) -> Self {
        Self {
            session,
            coordinator: Arc::new(coordinator),
            log,
            selected: None,
            last_result: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Capture session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Mutable capture session.
    #[inline]
    pub fn session_mut(&mut self) -> &mut CaptureSession {
        &mut self.session
    }

    /// Shared coordinator handle.
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> Arc<AnalysisRequestCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Activity log.
    #[inline]
    #[must_use]
    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// File chosen by the operator, if any.
    #[inline]
    #[must_use]
    pub fn selected_file(&self) -> Option<&ImageFile> {
        self.selected.as_ref()
    }

    /// Description from the last successful analysis.
    #[inline]
    #[must_use]
    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    /// Returns `true` while an analysis is in flight.
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.coordinator.is_busy()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Selects a file for the next analysis and clears the last result.
    pub fn select_file(&mut self, file: ImageFile) {
        self.log.info(format!("Image selected: {}", file.name));
        self.selected = Some(file);
        self.last_result = None;
    }

    /// Forgets the selected file; analysis falls back to the live frame.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Starts capture with the selected method, or stops it if live.
    ///
    /// # Errors
    ///
    /// Propagates [`CaptureSession::start`] errors.
    pub async fn toggle_capture(&mut self) -> Result<()> {
        if self.session.state().is_live() {
            self.session.stop().await;
            Ok(())
        } else {
            let method = self.session.method();
            self.session.start(method)
        }
    }

    /// Selects a transport method, stopping any live capture first.
    ///
    /// Capture is not restarted; the next [`toggle_capture`](Self::toggle_capture)
    /// uses the new method.
    ///
    /// # Errors
    ///
    /// Propagates [`CaptureSession::switch_method`] errors.
    pub async fn set_transport_method(&mut self, method: TransportMethod) -> Result<()> {
        self.session.stop().await;
        self.session.switch_method(method).await
    }

    /// Analyzes the selected file, or the live frame when none is selected.
    ///
    /// # Errors
    ///
    /// Propagates [`AnalysisRequestCoordinator::analyze`] errors.
    pub async fn analyze(&mut self) -> Result<AnalysisOutcome> {
        let source = match &self.selected {
            Some(file) => AnalysisSource::File(file.clone()),
            None => AnalysisSource::LiveFrame,
        };
        debug!(live = self.selected.is_none(), "Analysis requested");

        let outcome = self.coordinator.analyze(source).await?;
        self.last_result = Some(outcome.description.clone());
        Ok(outcome)
    }

    /// Stops capture and clears the selection and last result.
    pub async fn reset(&mut self) {
        self.session.stop().await;
        self.selected = None;
        self.last_result = None;
        self.log.info("Reset performed");
    }

    /// Applies the next transport event and returns the session state.
    pub async fn pump(&mut self) -> ConnectionState {
        self.session.process_next().await
    }
}

// ============================================================================
// Tests
// ============================================================================
