//! Shared types and business rules for the ERP fulfillment service
//!
//! This crate contains the domain records and the pure allocation / status
//! rules shared between the backend, the browser UI (via WASM), and tests.

pub mod allocation;
pub mod models;
pub mod types;
pub mod validation;

pub use allocation::*;
pub use models::*;
pub use types::*;
pub use validation::*;
