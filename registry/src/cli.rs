//! CLI argument definitions for the registry builder.
//!
//! Kept apart from the binary so argument parsing can be tested directly.

use crate::config::Config;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Build the Presto template registry.
#[derive(Parser, Debug)]
#[command(name = "presto-registry")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build the Presto template registry.\n\n",
    "Templates are discovered from the official repository, community ",
    "repositories tagged with the registry topic, and configured verified ",
    "sources. Released binaries are checked against their SHA256SUMS and run ",
    "in a network-isolated sandbox to harvest their manifest, example and ",
    "converted document. Verified sources are built from a pinned revision in ",
    "offline containers and published downstream.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Run every stage:\n",
    "    $ presto-registry run\n\n",
    "  Reprocess every template regardless of version:\n",
    "    $ FORCE_REBUILD=1 presto-registry run\n\n",
    "  Run stages separately:\n",
    "    $ presto-registry discover\n",
    "    $ presto-registry extract\n",
    "    $ presto-registry build\n",
    "    $ presto-registry compile --font-path fonts\n",
    "    $ presto-registry index",
))]
pub struct Cli {
    /// Stage to run.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: presto-registry.toml when present].
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory for per-template records.
    #[arg(long, value_name = "DIR", global = true)]
    pub output_dir: Option<Utf8PathBuf>,

    /// Registry index to read and write.
    #[arg(long, value_name = "FILE", global = true)]
    pub registry: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,
}

/// Available stages.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Find templates newer than the registry and write discovered.json.
    Discover(ForceArgs),

    /// Verify and harvest released binaries of discovered templates.
    Extract,

    /// Build, publish and harvest discovered verified sources.
    Build,

    /// Compile SVG previews of harvested documents.
    Compile(CompileArgs),

    /// Merge harvested records into the registry and sync the deploy mirror.
    Index,

    /// Run every stage in order.
    Run(RunArgs),
}

/// Arguments shared by stages that filter on version.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
pub struct ForceArgs {
    /// Reprocess templates whose version is already recorded.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the compile stage.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileArgs {
    /// Font directory passed to Typst.
    #[arg(long, value_name = "DIR")]
    pub font_path: Option<Utf8PathBuf>,
}

/// Arguments for a full run.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Reprocess templates whose version is already recorded.
    #[arg(long)]
    pub force: bool,

    /// Skip preview compilation.
    #[arg(long)]
    pub skip_compile: bool,

    /// Font directory passed to Typst.
    #[arg(long, value_name = "DIR")]
    pub font_path: Option<Utf8PathBuf>,
}

impl Cli {
    /// Apply command-line overrides to `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(path) = &self.registry {
            config.registry_path.clone_from(path);
        }
        match &self.command {
            Command::Discover(args) => config.force |= args.force,
            Command::Compile(args) => {
                if let Some(fonts) = &args.font_path {
                    config.font_path.clone_from(fonts);
                }
            }
            Command::Run(args) => {
                config.force |= args.force;
                if let Some(fonts) = &args.font_path {
                    config.font_path.clone_from(fonts);
                }
            }
            Command::Extract | Command::Build | Command::Index => {}
        }
    }

    /// Log filter directive for the chosen verbosity.
    #[must_use]
    pub fn log_directive(&self) -> &'static str {
        match (self.quiet, self.verbosity) {
            (true, _) => "presto_registry=warn",
            (false, 0) => "presto_registry=info",
            (false, 1) => "presto_registry=debug",
            (false, _) => "presto_registry=trace",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
