//! API endpoint handlers.
//!
//! Each sub-module owns the handlers for one resource. Handlers receive
//! `State<ApiContext>` and, on protected routes, `Extension<SessionContext>`.

pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod doctors;
pub mod health;
pub mod medical_records;
pub mod patients;
pub mod profiles;
pub mod services;
