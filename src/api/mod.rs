//! Clinic HTTP API.
//!
//! Routes are nested under `/api/`. Protected routes run behind
//! Rate Limit → Session → Audit → Handler; health and account recovery
//! are rate-limited only.
//!
//! The router is composable: `clinic_api_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::clinic_api_router;
pub use server::{start_server_on, ClinicServer, ServerError, ServerInfo};
pub use types::ApiContext;
