//! Core business logic for Kasse.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//!
//! # Modules
//!
//! - `ledger` - Balance-affecting operations and their rules
//! - `audit` - Audit action vocabulary

pub mod audit;
pub mod ledger;
