use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_targets_command() {
	let cli = Cli::try_parse_from(["webshell", "targets"]).unwrap();
	assert!(matches!(cli.command, Commands::Targets));
	assert_eq!(cli.verbose, 0);
	assert_eq!(cli.config, None);
}

#[test]
fn parse_open_with_targets_and_size() {
	let cli = Cli::try_parse_from(["webshell", "open", "host-a", "host-b", "--cols", "120", "--rows", "40"]).unwrap();

	match cli.command {
		Commands::Open(args) => {
			assert_eq!(args.targets, vec!["host-a", "host-b"]);
			assert_eq!(args.cols, Some(120));
			assert_eq!(args.rows, Some(40));
		}
		_ => panic!("Expected Open command"),
	}
}

#[test]
fn parse_open_without_targets_uses_selection() {
	let cli = Cli::try_parse_from(["webshell", "open"]).unwrap();
	match cli.command {
		Commands::Open(args) => assert!(args.targets.is_empty()),
		_ => panic!("Expected Open command"),
	}
}

#[test]
fn global_flags_after_subcommand() {
	let cli = Cli::try_parse_from(["webshell", "targets", "-vv", "--config", "/tmp/ws.json"]).unwrap();
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.config, Some(PathBuf::from("/tmp/ws.json")));
}

#[test]
fn unknown_command_is_rejected() {
	assert!(Cli::try_parse_from(["webshell", "frobnicate"]).is_err());
}
