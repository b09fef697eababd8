//! sdcadm command line support
//!
//! Argument parsing, config loading and update planning for the
//! `sdcadm` binary.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod logging;
pub mod plan;

pub use cli::{command, is_yes, UpdateAgentArgs};
pub use config::CliConfig;
pub use plan::{plan_change, PlanRequest};
