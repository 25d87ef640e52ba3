use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cinder")]
#[command(about = "Cinder - attach to a server-driven page from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Open a session for a page and follow its rerenders until Ctrl-C
	Attach(AttachArgs),

	/// Print the socket endpoint, path, and request id for a page as JSON
	Inspect(InspectArgs),
}

/// Where the page lives and how to identify the session.
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
	/// URL of the server-rendered page (http or https)
	#[arg(value_name = "PAGE_URL")]
	pub page_url: String,

	/// Request id to present instead of the one embedded in the page
	#[arg(long, env = "CINDER_REQUEST_ID", value_name = "ID")]
	pub request_id: Option<String>,

	/// Timeout for fetching the page
	#[arg(long, value_name = "MS", default_value_t = 10_000)]
	pub fetch_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct AttachArgs {
	#[command(flatten)]
	pub page: PageArgs,

	/// Write each rendered view to this file instead of stdout
	#[arg(short, long, value_name = "FILE")]
	pub output: Option<PathBuf>,

	/// Navigate to this path once the session is open
	#[arg(long, value_name = "PATH")]
	pub navigate: Option<String>,

	/// Reply window for commands and the handshake
	#[arg(long, env = "CINDER_REPLY_TIMEOUT_MS", value_name = "MS", default_value_t = 5000)]
	pub reply_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
	#[command(flatten)]
	pub page: PageArgs,
}
