//! rbackup: configuration-driven rsync backups.
//!
//! This crate resolves declarative per-target filesets into ordered sync jobs
//! and runs them through external mkdir and rsync commands, one target at a
//! time or on a bounded pool, isolating failures between targets.

pub mod commands;
pub mod config;
pub mod error;
pub mod fileset;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod path;
pub mod runner;
pub mod sysexits;

pub use error::{Error, Result};
