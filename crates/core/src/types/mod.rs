//! Core types for Stablemart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{Currency, Money, MoneyError};
pub use status::*;
