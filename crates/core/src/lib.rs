//! Core business logic for doctrack.
//!
//! Services sit between the HTTP layer and the repositories. They validate
//! input, enforce the access policy and shape the JSON views returned to
//! clients.

pub mod services;

pub use services::*;
