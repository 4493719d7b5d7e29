//! Scan pipeline errors.
//!
//! Every failure is surfaced once, as-is. Nothing in the pipeline retries.

use std::error::Error as StdError;
use std::time::Duration;

use http_body_util::LengthLimitError;

use crate::scan::admission::AdmissionError;

/// Boxed error from an upload byte stream.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors that can occur while scanning an upload.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The body could not be parsed as multipart data.
    #[error("invalid multipart request: {0}")]
    MalformedPayload(#[source] multer::Error),

    /// The `Content-Type` is not multipart or carries no boundary.
    #[error("invalid multipart request: {0}")]
    InvalidContentType(String),

    /// No part named `file` was present.
    #[error("no file found in multipart data")]
    NoFilePart,

    /// The body exceeded the configured size ceiling.
    #[error("request body exceeds the configured size limit")]
    PayloadTooLarge,

    /// The file part could not be fully drained.
    #[error("failed to read input stream: {0}")]
    Read(#[source] BoxError),

    /// The engine executable could not be launched.
    #[error("failed to start inspection engine `{program}`: {source}")]
    EngineProcessStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine reported a configuration problem.
    #[error("inspection engine configuration error: {output}")]
    EngineConfig { output: String },

    /// The engine exited with an unexpected status or was killed by a signal.
    #[error("inspection engine failed with exit code {}: {output}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    EngineExit { code: Option<i32>, output: String },

    /// The engine did not finish before its deadline and was killed.
    #[error("inspection engine exceeded its {0:?} deadline and was terminated")]
    EngineTimeout(Duration),

    /// Talking to the engine process failed after it started.
    #[error("inspection engine I/O error: {0}")]
    EngineIo(#[source] std::io::Error),

    /// Waiting for a scan slot took longer than allowed.
    #[error("no scan capacity became available within {0:?}")]
    CapacityTimeout(Duration),

    /// The outer request timeout fired before the pipeline answered.
    #[error("request not completed within {0:?}")]
    RequestTimeout(Duration),
}

/// Coarse classification used for responses, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedPayload,
    NoFilePart,
    PayloadTooLarge,
    ReadError,
    EngineProcessStartError,
    EngineConfigError,
    EngineExecutionError,
    CapacityTimeout,
    RequestTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::NoFilePart => "no_file_part",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::ReadError => "read_error",
            ErrorKind::EngineProcessStartError => "engine_process_start_error",
            ErrorKind::EngineConfigError => "engine_config_error",
            ErrorKind::EngineExecutionError => "engine_execution_error",
            ErrorKind::CapacityTimeout => "capacity_timeout",
            ErrorKind::RequestTimeout => "request_timeout",
        }
    }

    /// True for problems with the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedPayload | ErrorKind::NoFilePart | ErrorKind::PayloadTooLarge
        )
    }
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::MalformedPayload(_) | ScanError::InvalidContentType(_) => {
                ErrorKind::MalformedPayload
            }
            ScanError::NoFilePart => ErrorKind::NoFilePart,
            ScanError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            ScanError::Read(_) => ErrorKind::ReadError,
            ScanError::EngineProcessStart { .. } => ErrorKind::EngineProcessStartError,
            ScanError::EngineConfig { .. } => ErrorKind::EngineConfigError,
            ScanError::EngineExit { .. } | ScanError::EngineTimeout(_) | ScanError::EngineIo(_) => {
                ErrorKind::EngineExecutionError
            }
            ScanError::CapacityTimeout(_) => ErrorKind::CapacityTimeout,
            ScanError::RequestTimeout(_) => ErrorKind::RequestTimeout,
        }
    }

    /// Classify a multipart parser failure.
    pub(crate) fn from_multipart(err: multer::Error) -> Self {
        if multipart_hit_length_limit(&err) {
            ScanError::PayloadTooLarge
        } else {
            ScanError::MalformedPayload(err)
        }
    }

    /// The upload did not arrive within `limit`.
    pub(crate) fn read_timeout(limit: Duration) -> Self {
        ScanError::Read(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("upload not received within {limit:?}"),
        )))
    }

    /// Classify a failure while draining the upload.
    pub(crate) fn from_read(err: BoxError) -> Self {
        if hit_length_limit(err.as_ref()) {
            ScanError::PayloadTooLarge
        } else {
            ScanError::Read(err)
        }
    }
}

impl From<AdmissionError> for ScanError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Timeout(wait) => ScanError::CapacityTimeout(wait),
        }
    }
}

/// Walk an error chain looking for the body limit rejection.
pub(crate) fn hit_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        if let Some(multipart) = e.downcast_ref::<multer::Error>() {
            if multipart_hit_length_limit(multipart) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn multipart_hit_length_limit(err: &multer::Error) -> bool {
    match err {
        multer::Error::StreamReadFailed(inner) => hit_length_limit(inner.as_ref()),
        _ => false,
    }
}
