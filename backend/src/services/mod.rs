//! Business logic services for the ERP fulfillment service

pub mod allocation;
pub mod packaging;
pub mod production;
pub mod sales;

pub use allocation::AllocationService;
pub use packaging::PackagingService;
pub use production::ProductionService;
pub use sales::SalesService;
