// ABOUTME: Library module for cassandra-shift-cli
// ABOUTME: Exports configuration, cluster bootstrap, engine contract, and dispatch

pub mod bootstrap;
pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;

pub use error::ShiftError;
