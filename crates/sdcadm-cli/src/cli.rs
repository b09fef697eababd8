//! Command definition

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Config file read when `-c` is not given
pub const DEFAULT_CONFIG: &str = "/opt/smartdc/sdcadm/etc/sdcadm.toml";

pub fn command() -> Command {
    Command::new("sdcadm")
        .version(sdcadm_core::VERSION)
        .about("Administer a compute fleet: roll agent images out across servers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug output to stderr"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .default_value(DEFAULT_CONFIG)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the sdcadm config file"),
        )
        .subcommand(
            Command::new("update-agent")
                .about("Install an agent image on every server running the agent")
                .arg(
                    Arg::new("service")
                        .required(true)
                        .help("Agent service name, e.g. cn-agent"),
                )
                .arg(
                    Arg::new("image")
                        .short('i')
                        .long("image")
                        .required(true)
                        .help("UUID of the image to install"),
                )
                .arg(
                    Arg::new("servers")
                        .short('s')
                        .long("servers")
                        .value_delimiter(',')
                        .help("Only update these servers (comma separated UUIDs)"),
                )
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Do not ask for confirmation"),
                )
                .arg(
                    Arg::new("concurrency")
                        .short('j')
                        .long("concurrency")
                        .value_parser(value_parser!(usize))
                        .help("Servers updated at once (overrides the config file)"),
                )
                .arg(
                    Arg::new("dry-run")
                        .short('n')
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print what would be done and exit"),
                ),
        )
}

/// Parsed `update-agent` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAgentArgs {
    pub service: String,
    pub image: String,
    pub servers: Option<Vec<String>>,
    pub yes: bool,
    pub concurrency: Option<usize>,
    pub dry_run: bool,
}

impl UpdateAgentArgs {
    #[must_use]
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            service: args.get_one::<String>("service").cloned().unwrap_or_default(),
            image: args.get_one::<String>("image").cloned().unwrap_or_default(),
            servers: args
                .get_many::<String>("servers")
                .map(|values| values.filter(|s| !s.is_empty()).cloned().collect()),
            yes: args.get_flag("yes"),
            concurrency: args.get_one::<usize>("concurrency").copied(),
            dry_run: args.get_flag("dry-run"),
        }
    }
}

/// Whether a prompt answer means yes
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
