use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use planner_shared::{TaskFilter, UiEvent};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "planner",
    version,
    about = "Planner: to-do list client for a GraphQL task API",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "plannerrc", global = true)]
    pub plannerrc: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the task list
    List {
        #[arg(short = 'f', long = "filter")]
        filter: Option<TaskFilter>,
    },
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Flip a task between active and completed
    Toggle { id: String },
    /// Rename a task
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Delete a task
    Delete { id: String },
    /// List the available filters
    Filters,
    /// Interactive session reading commands from stdin
    Shell,
}

impl Command {
    /// The store event this one-shot command stands for, if any.
    pub fn event(&self) -> Option<UiEvent> {
        match self {
            Command::List { filter } => filter.map(|filter| UiEvent::SetFilter { filter }),
            Command::Add { name } => Some(UiEvent::Add {
                name: name.join(" "),
            }),
            Command::Toggle { id } => Some(UiEvent::Toggle { id: id.clone() }),
            Command::Edit { id, name } => Some(UiEvent::Edit {
                id: id.clone(),
                name: name.join(" "),
            }),
            Command::Delete { id } => Some(UiEvent::Delete { id: id.clone() }),
            Command::Filters | Command::Shell => None,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
