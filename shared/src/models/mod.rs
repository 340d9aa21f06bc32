//! Domain models for the ERP fulfillment service

mod finance;
mod order;
mod packaging;
mod product;
mod production;
mod sale;
mod tracking;

pub use finance::*;
pub use order::*;
pub use packaging::*;
pub use product::*;
pub use production::*;
pub use sale::*;
pub use tracking::*;
