//! Tests for watch.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_watch() {
    let cli = parse(&["rcstream", "watch"]);
    assert!(cli.config.is_none());
    match cli.command {
        CliCommand::Watch { background_after } => assert!(background_after.is_none()),
        _ => panic!("expected Watch"),
    }
}

#[test]
fn cli_parse_watch_with_config_and_background() {
    let cli = parse(&[
        "rcstream",
        "watch",
        "--config",
        "/tmp/rc.toml",
        "--background-after",
        "30",
    ]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/rc.toml")));
    match cli.command {
        CliCommand::Watch { background_after } => assert_eq!(background_after, Some(30)),
        _ => panic!("expected Watch"),
    }
}

#[test]
fn cli_parse_watch_rejects_negative_seconds() {
    assert!(Cli::try_parse_from(["rcstream", "watch", "--background-after", "-1"]).is_err());
}
