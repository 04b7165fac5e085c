//! Command implementations

pub mod config;
pub mod run;
pub mod simulate;
pub mod sweep;
