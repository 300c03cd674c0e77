//! Command-line front end for the unified engine.

pub mod cli;
pub mod commands;
