//! Validation utilities for the fulfillment service

use crate::models::PackagingJob;
use crate::types::Quantity;

/// Longest free-text payment term accepted at the boundary
pub const MAX_PAYMENT_TERM_LEN: usize = 64;

/// Validate a quantity is not negative
pub fn validate_quantity(quantity: Quantity) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Validate a packaged quantity against the job it is reported for
pub fn validate_packaged_quantity(job: &PackagingJob, packaged: Quantity) -> Result<(), &'static str> {
    validate_quantity(packaged)?;
    if packaged > job.quantity_to_package {
        return Err("Packaged quantity exceeds quantity to package");
    }
    Ok(())
}

/// Validate a quantity reported when approving a packaging job
pub fn validate_approved_quantity(packaged: Quantity) -> Result<(), &'static str> {
    if packaged <= 0 {
        return Err("Cannot approve a job with nothing packaged");
    }
    Ok(())
}

/// Validate a produced quantity
pub fn validate_produced_quantity(produced: Quantity) -> Result<(), &'static str> {
    if produced <= 0 {
        return Err("Produced quantity must be positive");
    }
    Ok(())
}

/// Validate free-text payment term length
pub fn validate_payment_term_text(term: &str) -> Result<(), &'static str> {
    if term.chars().count() > MAX_PAYMENT_TERM_LEN {
        return Err("Payment term is too long");
    }
    Ok(())
}
