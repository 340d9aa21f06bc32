//! HTTP request handlers

pub mod fulfillment;
pub mod health;
pub mod packaging;
pub mod production;
pub mod sales;

pub use fulfillment::*;
pub use health::*;
pub use packaging::*;
pub use production::*;
pub use sales::*;
