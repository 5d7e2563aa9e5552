//! # cellpci
//!
//! Application layer around `cellpci-core`: configuration, the loopback
//! control transport, the operator HTTP API and the CLI.

pub mod api;
pub mod cli;
pub mod config;
pub mod transport;
