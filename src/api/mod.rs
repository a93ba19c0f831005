//! HTTP front door.
//!
//! Parses multipart uploads, hands them to the `UploadDispatcher` and
//! renders the outcome as JSON. Routes are nested under `/api/`.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer, ApiSession};
pub use types::ApiContext;
