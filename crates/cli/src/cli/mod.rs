#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

/// Multiplexed remote shell sessions.
#[derive(Parser, Debug)]
#[command(name = "webshell")]
#[command(about = "Open and multiplex interactive shells on remote targets")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to $WEBSHELL_CONFIG, then ~/.config/webshell/config.json)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List configured targets.
	Targets,
	/// Open one session per target and attach stdin to the last one.
	Open(OpenArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OpenArgs {
	/// Target names; the configured selection when omitted.
	#[arg(value_name = "TARGET")]
	pub targets: Vec<String>,

	/// Terminal width reported to the remote shell.
	#[arg(long, value_name = "COLS")]
	pub cols: Option<u16>,

	/// Terminal height reported to the remote shell.
	#[arg(long, value_name = "ROWS")]
	pub rows: Option<u16>,
}

/// Cargo-style help colors.
pub fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
}
