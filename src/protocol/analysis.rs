//! Analysis service response bodies.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::UploadId;

// ============================================================================
// UploadResponse
// ============================================================================

/// Body returned by the upload endpoint.
///
/// ```json
/// { "filename": "webcam_frame.jpg" }
/// ```
///
/// or, when the server refuses the file:
///
/// ```json
/// { "message": "bad format" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Stored filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Rejection message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    /// Successful upload.
    #[must_use]
    pub fn accepted(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            message: None,
        }
    }

    /// Rejected upload.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            filename: None,
            message: Some(message.into()),
        }
    }

    /// Converts into the uploaded file's id.
    ///
    /// # Errors
    ///
    /// - [`Error::UploadRejected`] if a `message` is present
    /// - [`Error::Protocol`] if neither field is present
    pub fn into_upload_id(self) -> Result<UploadId> {
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            return Err(Error::upload_rejected(message));
        }
        self.filename
            .filter(|f| !f.is_empty())
            .map(UploadId::new)
            .ok_or_else(|| Error::protocol("Upload response missing filename"))
    }
}

// ============================================================================
// AnalyzeResponse
// ============================================================================

/// Body returned by the analyze endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Scene description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AnalyzeResponse {
    /// Response carrying a description.
    #[must_use]
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    /// Extracts the description.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the field is missing.
    pub fn into_description(self) -> Result<String> {
        self.description
            .ok_or_else(|| Error::protocol("Analyze response missing description"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::from_str;

    #[test]
    fn test_upload_accepted() {
        let response: UploadResponse = from_str(r#"{"filename":"a.jpg"}"#).unwrap();
        assert_eq!(response.into_upload_id().unwrap().as_str(), "a.jpg");
    }

    #[test]
    fn test_upload_message_is_rejection() {
        let response: UploadResponse =
            from_str(r#"{"message":"bad format","filename":"a.jpg"}"#).unwrap();
        assert!(matches!(
            response.into_upload_id(),
            Err(Error::UploadRejected { ref message }) if message == "bad format"
        ));
    }

    #[test]
    fn test_upload_empty_body() {
        let response: UploadResponse = from_str("{}").unwrap();
        assert!(matches!(response.into_upload_id(), Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_analyze_description() {
        let response: AnalyzeResponse = from_str(r#"{"description":"A cat on a desk"}"#).unwrap();
        assert_eq!(response.into_description().unwrap(), "A cat on a desk");
    }

    #[test]
    fn test_analyze_missing_description() {
        assert!(AnalyzeResponse::default().into_description().is_err());
    }
}
