// Stepper - Pipeline Stepping Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Stepper - Pipeline Stepping Debugger
//!
//! Steps record by record through the output of a data processing pipeline
//! run over streams held in a filesystem store.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use eyre::Result;
use stepper_common::{logging, ContainerId, FindMetaCriteria, StepLocation, StepType};
use stepper_engine::{FsStore, StepperConfig};

mod cmd;
mod utils;

/// Command-line interface for the stepper
#[derive(Debug, Parser)]
#[command(name = "stepper")]
#[command(about = "Pipeline Stepper - Step record by record through data processing pipelines")]
#[command(version)]
pub struct Cli {
    /// Directory of the stream store (overrides the config file)
    #[arg(long, env = "STEPPER_STORE")]
    pub store: Option<PathBuf>,

    /// Configuration file (default: ~/.stepper.toml)
    #[arg(long, env = "STEPPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to a rolling file in the temp directory
    #[arg(long)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the streams in the store
    Streams {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Add a stream to the store, one part per file
    Import {
        /// Stream id
        #[arg(long)]
        id: ContainerId,

        /// Feed the stream belongs to
        #[arg(long)]
        feed: String,

        /// Stream type
        #[arg(long, default_value = "Raw Events")]
        stream_type: String,

        /// Child stream attached to every part, as TYPE=FILE
        #[arg(long, value_parser = utils::parse_assignment)]
        child: Vec<(String, String)>,

        /// Files holding the parts, in order
        #[arg(required = true)]
        parts: Vec<PathBuf>,
    },
    /// Take a single step
    Step {
        /// Direction: first, last, forward, backward or refresh
        step_type: StepType,

        /// Location to step from, as id:part:record
        #[arg(long)]
        at: Option<StepLocation>,

        #[command(flatten)]
        args: StepArgs,
    },
    /// Step repeatedly and print every record reached
    Walk {
        /// Start at the last record and walk backwards
        #[arg(long)]
        backward: bool,

        /// Maximum number of records to print
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only print the output of this element
        #[arg(long)]
        element: Option<String>,

        #[command(flatten)]
        args: StepArgs,
    },
}

/// Which streams to look at
#[derive(Debug, Clone, Default, Args)]
pub struct SelectionArgs {
    /// Only streams of this feed
    #[arg(long)]
    pub feed: Option<String>,

    /// Only streams of this type
    #[arg(long = "type")]
    pub type_name: Option<String>,

    /// Only these stream ids
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<ContainerId>,
}

impl SelectionArgs {
    /// The selection as store criteria.
    pub fn criteria(&self) -> FindMetaCriteria {
        let mut criteria = FindMetaCriteria::all();
        criteria.feed_name = self.feed.clone();
        criteria.type_name = self.type_name.clone();
        if !self.ids.is_empty() {
            criteria = criteria.with_ids(self.ids.clone());
        }
        criteria
    }
}

/// Arguments shared by the stepping commands
#[derive(Debug, Clone, Args)]
pub struct StepArgs {
    /// Pipeline definition (TOML)
    #[arg(long)]
    pub pipeline: PathBuf,

    /// Read this child stream instead of the main data
    #[arg(long)]
    pub child: Option<String>,

    /// Milliseconds to wait for a step (0 uses the configured default)
    #[arg(long, default_value = "0")]
    pub timeout_ms: u64,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Conditions a record must meet to be stepped to
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Stop where an element raised at least a severity, as ELEMENT=LEVEL
    #[arg(long, value_parser = utils::parse_assignment)]
    pub severity: Vec<(String, String)>,

    /// Stop where an element's output is empty or not-empty, as ELEMENT=STATE
    #[arg(long, value_parser = utils::parse_assignment)]
    pub output: Vec<(String, String)>,

    /// Stop where an element's output contains a value, as ELEMENT=VALUE
    #[arg(long, value_parser = utils::parse_assignment)]
    pub contains: Vec<(String, String)>,

    /// Stop where an element's output equals a value, as ELEMENT=VALUE
    #[arg(long, value_parser = utils::parse_assignment)]
    pub equals: Vec<(String, String)>,

    /// Stop on each new value at a JSON pointer, as ELEMENT=/POINTER
    #[arg(long, value_parser = utils::parse_assignment)]
    pub unique: Vec<(String, String)>,

    /// Compare contains and equals values case-insensitively
    #[arg(long)]
    pub ignore_case: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    logging::init_logging("stepper", cli.log_file)?;

    let config = match &cli.config {
        Some(path) => StepperConfig::load(path)?,
        None => StepperConfig::load_default()?,
    };
    let root = cli
        .store
        .clone()
        .or_else(|| config.store.root.clone())
        .ok_or_else(|| eyre::eyre!("No store directory given, use --store or set store.root"))?;
    tracing::info!("Using store at {:?}", root);
    let store = FsStore::new(root)?;

    match cli.command {
        Commands::Streams { selection } => cmd::list_streams(&store, &selection),
        Commands::Import { id, feed, stream_type, child, parts } => {
            cmd::import_stream(&store, id, &feed, &stream_type, &child, &parts)
        }
        Commands::Step { step_type, at, args } => {
            cmd::take_step(store, &config, step_type, at, &args).await
        }
        Commands::Walk { backward, limit, element, args } => {
            cmd::walk(store, &config, backward, limit, element.as_deref(), &args).await
        }
    }
}
