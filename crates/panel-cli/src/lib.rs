//! Library side of the `panelkit` binary.

pub mod commands;
pub mod logging;
pub mod types;
