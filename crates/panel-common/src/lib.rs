//! Shared utilities for panel crates.
//!
//! This crate provides the Polars `AnyValue` helpers used across the panel
//! workspace to move values between typed columns and plain Rust values.

pub mod any_value;

pub use any_value::{
    any_is_missing, any_to_f64, any_to_i64, any_to_string, format_numeric, parse_f64, parse_i64,
};
