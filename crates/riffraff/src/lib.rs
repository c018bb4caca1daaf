//! riffraff-artefact CLI library.
//!
//! Argument parsing, logging setup and subcommand implementations for the
//! `riffraff-artefact` binary. The packaging and publishing logic lives in
//! `riffraff-release`.

pub mod cli;
pub mod commands;
pub mod tracing;
