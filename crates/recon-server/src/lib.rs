//! HTTP server for recon.
//!
//! Exposes the bundle merge over a small JSON API so that a client can ask
//! the host to reconcile two zip bundles already on its filesystem.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{MergeRequest, MergeResponse};
pub use router::{build_router, AppState};
pub use server::ReconServer;
