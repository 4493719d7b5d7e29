//! Bounded-concurrency virus scan gateway library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scan;

pub use config::schema::ScanConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use scan::Scanner;
