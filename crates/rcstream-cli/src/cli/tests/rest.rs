//! Tests for status, reset, fingerprint.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_status() {
    match parse(&["rcstream", "status"]).command {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_status_config_before_subcommand() {
    let cli = parse(&["rcstream", "--config", "rc.toml", "status"]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("rc.toml")));
    assert!(matches!(cli.command, CliCommand::Status));
}

#[test]
fn cli_parse_reset() {
    match parse(&["rcstream", "reset"]).command {
        CliCommand::Reset => {}
        _ => panic!("expected Reset"),
    }
}

#[test]
fn cli_parse_fingerprint() {
    match parse(&["rcstream", "fingerprint", "/etc/app/cert.der"]).command {
        CliCommand::Fingerprint { path } => assert_eq!(path, Path::new("/etc/app/cert.der")),
        _ => panic!("expected Fingerprint"),
    }
}

#[test]
fn cli_parse_fingerprint_requires_path() {
    assert!(Cli::try_parse_from(["rcstream", "fingerprint"]).is_err());
}

#[test]
fn cli_parse_unknown_command_fails() {
    assert!(Cli::try_parse_from(["rcstream", "add", "x"]).is_err());
}
