//! Wiring for the `sdbot` binary: configuration and logging setup.

pub mod config;
pub mod telemetry;
