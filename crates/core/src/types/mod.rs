//! Core types for Loom & Co.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{Money, TAX_RATE_PERCENT, tax_rate};
pub use status::*;
