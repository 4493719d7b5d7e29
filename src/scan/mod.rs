//! Upload inspection subsystem.
//!
//! # Data Flow
//! ```text
//! POST /scan body
//!     → admission.rs (bounded concurrency gate)
//!     → multipart.rs (find the `file` part)
//!     → engine.rs (external scanner under a deadline)
//!     → verdict.rs (clean / infected + threat name)
//!     → result.rs (JSON response payload)
//! ```
//!
//! `pipeline.rs` drives the whole sequence; `pool.rs` supplies the reusable
//! buffers used for content and response bodies.
//!
//! # Design Decisions
//! - A slot is held from before the body is parsed until the response body is built
//! - The engine reads the upload from stdin, never from a temp file
//! - Failures are reported once and never retried

pub mod admission;
pub mod engine;
pub mod error;
pub mod multipart;
pub mod pipeline;
pub mod pool;
pub mod result;
pub mod verdict;

pub use admission::{AdmissionLimiter, CapacityToken};
pub use engine::InspectionEngine;
pub use error::{ErrorKind, ScanError};
pub use pipeline::Scanner;
pub use result::ScanResult;
pub use verdict::{ScanStatus, ScanVerdict};
