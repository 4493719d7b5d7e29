//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (request ID assigned or kept)
//!     → cors.rs (origin check, preflight)
//!     → server.rs (body limit, timeout, routing)
//!     → scan pipeline
//!     → response.rs (errors as JSON with a matching status)
//! ```

pub mod cors;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeScanRequestId, X_REQUEST_ID};
pub use response::ErrorBody;
pub use server::{AppState, HttpServer};
