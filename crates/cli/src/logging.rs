//! Stderr logging for the `cinder` binary.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Crates whose events the verbosity flag controls.
const OWN_TARGETS: [&str; 3] = ["cinder_cli", "cinder_runtime", "cinder_protocol"];

/// Directive string for a `-v` count.
///
/// Dependencies (tungstenite, reqwest, hyper) stay one level quieter than our
/// own crates until the highest setting.
fn default_filter(verbosity: u8) -> String {
	let (deps, own, runtime) = match verbosity {
		// Reconnect and handshake failures only
		0 => ("error", "warn", "warn"),
		// Session lifecycle: connecting, open, disconnected
		1 => ("warn", "info", "info"),
		// Every frame routed and every pending request
		2 => ("info", "debug", "debug"),
		_ => ("debug", "debug", "trace"),
	};

	let mut directives = vec![deps.to_string()];
	for target in OWN_TARGETS {
		let level = if target == "cinder_runtime" { runtime } else { own };
		directives.push(format!("{target}={level}"));
	}
	directives.join(",")
}

/// Installs the global subscriber. `RUST_LOG` overrides the verbosity flag.
pub fn init_logging(verbosity: u8) {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	// Rendered views and inspect JSON own stdout
	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.with_target(verbosity > 0)
		.compact()
		.init();
}
