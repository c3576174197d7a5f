//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and dispatches to the command
//! implementations.

pub mod chat;
pub mod flow_list;
pub mod say;
pub mod session;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::cli::chat::run_chat;
use crate::cli::flow_list::list_flows;
use crate::cli::say::run_say;
use crate::core::config::data::{path_display, ConfigKey};
use crate::core::config::Config;
use crate::utils::logging::init_tracing;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "flowtalk")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Chat with conversational flows on a flow-execution service")]
#[command(
    long_about = "Flowtalk sends your conversation to a flow on a flow-execution service \
and prints the reply as it streams in.\n\n\
Environment Variables (override the config file):\n\
  FLOWTALK_BASE_URL      Flow service address (defaults to http://127.0.0.1:7860)\n\
  FLOWTALK_CATALOG_URL   Flow catalog address (defaults to the flow service)\n\
  FLOWTALK_ACCESS_TOKEN  Bearer token for the flow catalog\n\
  RUST_LOG               Diagnostic log filter (defaults to warn)\n\n\
Chat controls:\n\
  Enter             Send the message\n\
  Ctrl+C            Cancel the reply in progress, or quit at the prompt\n\
  /reset            Start a new conversation\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Append the conversation to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub transcript: Option<PathBuf>,
}

/// Options shared by the commands that run a flow.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunOptions {
    /// Flow to run (defaults to the configured default-flow)
    #[arg(short = 'f', long, value_name = "FLOW_ID")]
    pub flow: Option<String>,

    /// Override a component setting, e.g. --tweak ChatModel-1.temperature=0.2
    #[arg(short = 't', long = "tweak", value_name = "COMPONENT.NAME=VALUE")]
    pub tweaks: Vec<String>,

    /// Ask the flow for its full reply at once instead of streaming
    #[arg(long)]
    pub no_stream: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single prompt and print the reply
    Say {
        #[command(flatten)]
        run: RunOptions,
        /// The prompt text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Start an interactive conversation (default)
    Chat {
        #[command(flatten)]
        run: RunOptions,
    },
    /// List flows from the catalog, or show one flow's settings
    Flows {
        /// Flow to describe
        flow: Option<String>,
    },
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the current configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    match args.command.unwrap_or(Commands::Chat {
        run: RunOptions::default(),
    }) {
        Commands::Say { run, prompt } => run_say(prompt, run, args.transcript).await,
        Commands::Chat { run } => run_chat(run, args.transcript).await,
        Commands::Flows { flow } => list_flows(flow).await,
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            if value.is_empty() {
                config.print_all();
                return Ok(());
            }
            let key = ConfigKey::try_from(key.as_str())?;
            let value = value.join(" ");
            config.set_value(key, &value)?;
            let path = config.save()?;
            println!("✅ Set {} to: {}", key.as_str(), value.trim());
            tracing::debug!(path = %path_display(&path), "Config saved");
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            let key = ConfigKey::try_from(key.as_str())?;
            config.unset_value(key);
            config.save()?;
            println!("✅ Unset {}", key.as_str());
            Ok(())
        }
        Commands::Config => {
            let config = Config::load()?;
            config.print_all();
            let path = Config::get_config_path()?;
            println!();
            println!("Config file: {}", path_display(path));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
