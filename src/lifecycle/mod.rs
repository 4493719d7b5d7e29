//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight scans finish → exit
//! ```
//!
//! # Design Decisions
//! - Startup order lives in `main`: config, logging, metrics, bind, serve
//! - A scan already holding a slot runs to completion or to its deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
