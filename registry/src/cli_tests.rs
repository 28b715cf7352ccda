//! Tests for CLI parsing and overrides.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_stage_without_options() {
    let cli = Cli::parse_from(["presto-registry", "index"]);
    assert_eq!(cli.command, Command::Index);
    assert!(cli.config.is_none());
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
}

#[test]
fn global_options_follow_the_subcommand() {
    let cli = Cli::parse_from([
        "presto-registry",
        "run",
        "--force",
        "--skip-compile",
        "--output-dir",
        "/tmp/out",
        "-c",
        "ci.toml",
    ]);
    assert_eq!(
        cli.command,
        Command::Run(RunArgs {
            force: true,
            skip_compile: true,
            font_path: None,
        })
    );
    assert_eq!(cli.output_dir, Some(Utf8PathBuf::from("/tmp/out")));
    assert_eq!(cli.config, Some(Utf8PathBuf::from("ci.toml")));
}

#[test]
fn verbose_conflicts_with_quiet() {
    let result = Cli::try_parse_from(["presto-registry", "-v", "-q", "index"]);
    assert!(result.is_err());
}

#[rstest]
#[case::quiet(&["presto-registry", "-q", "index"], "presto_registry=warn")]
#[case::default(&["presto-registry", "index"], "presto_registry=info")]
#[case::debug(&["presto-registry", "-v", "index"], "presto_registry=debug")]
#[case::trace(&["presto-registry", "-vv", "index"], "presto_registry=trace")]
fn verbosity_selects_log_level(#[case] args: &[&str], #[case] expected: &str) {
    let cli = Cli::parse_from(args);
    assert_eq!(cli.log_directive(), expected);
}

#[test]
fn overrides_replace_configured_paths() {
    let cli = Cli::parse_from([
        "presto-registry",
        "--registry",
        "site/registry.json",
        "compile",
        "--font-path",
        "/usr/share/fonts/noto",
    ]);
    let mut config = Config::default();
    cli.apply_to(&mut config);
    assert_eq!(config.registry_path, Utf8PathBuf::from("site/registry.json"));
    assert_eq!(config.font_path, Utf8PathBuf::from("/usr/share/fonts/noto"));
    assert!(!config.force);
}

#[test]
fn force_flag_never_clears_configured_force() {
    let cli = Cli::parse_from(["presto-registry", "discover"]);
    let mut config = Config {
        force: true,
        ..Config::default()
    };
    cli.apply_to(&mut config);
    assert!(config.force);
}
