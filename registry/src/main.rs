//! Presto registry builder entrypoint.
//!
//! Discovers templates, verifies and harvests their binaries, builds
//! verified sources, compiles previews, and writes `registry.json`.

use clap::Parser;
use presto_registry::build::container::DockerRuntime;
use presto_registry::build::publish::GhPublisher;
use presto_registry::cli::{Cli, Command};
use presto_registry::command::SystemCommandExecutor;
use presto_registry::config::Config;
use presto_registry::error::Result;
use presto_registry::pipeline::{Pipeline, Services};
use presto_registry::preview::TypstCompiler;
use presto_registry::sandbox::ProcessSandbox;
use presto_registry::source::github::GitHubClient;
use presto_registry::summary::RunSummary;
use std::io::Write;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// `RUST_LOG` wins unless a verbosity flag was given.
fn init_tracing(cli: &Cli) {
    let flagged = cli.quiet || cli.verbosity > 0;
    let filter = if flagged {
        EnvFilter::new(cli.log_directive())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_directive()))
    };
    let subscriber = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter);
    if subscriber.try_init().is_err() {
        // A subscriber is already installed.
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    cli.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let config = load_config(cli)?;

    let provider = GitHubClient::from_env();
    let sandbox = ProcessSandbox::new(config.network_isolation)?;
    let executor = SystemCommandExecutor;
    let runtime = DockerRuntime::new(executor);
    let publisher = GhPublisher::new(executor);
    let compiler = TypstCompiler::new(executor);
    let services = Services {
        provider: &provider,
        sandbox: &sandbox,
        executor: &executor,
        runtime: &runtime,
        publisher: &publisher,
        compiler: &compiler,
    };
    let pipeline = Pipeline::new(&config, services)?;

    match &cli.command {
        Command::Discover(_) => {
            let candidates = pipeline.discover()?;
            write_stderr_line(stderr, format!("{} candidate(s) discovered", candidates.len()));
        }
        Command::Extract => report(stderr, &pipeline.extract()?),
        Command::Build => report(stderr, &pipeline.build()?),
        Command::Compile(_) => report(stderr, &pipeline.compile()?),
        Command::Index => {
            let registry = pipeline.index()?;
            write_stderr_line(
                stderr,
                format!("registry holds {} template(s)", registry.templates.len()),
            );
        }
        Command::Run(args) => {
            let (summary, registry) = pipeline.run(args.skip_compile)?;
            report(stderr, &summary);
            write_stderr_line(
                stderr,
                format!("registry holds {} template(s)", registry.templates.len()),
            );
        }
    }
    Ok(())
}

/// Skipped templates do not fail the run; they are listed for the operator.
fn report(stderr: &mut dyn Write, summary: &RunSummary) {
    write_stderr_line(stderr, summary);
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}
