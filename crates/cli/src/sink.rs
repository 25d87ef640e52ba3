//! View sink that writes every rerendered view out.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cinder_runtime::ViewSink;

use crate::error::{CliError, Result};

/// Keeps the current view and writes each replacement to stdout or a file.
///
/// A file destination is truncated and rewritten on every rerender so it
/// always holds exactly the current view. Stdout and writers get each view
/// followed by a blank line.
pub struct OutputSink {
	html: String,
	destination: Destination,
}

enum Destination {
	Stdout,
	File(PathBuf),
	Writer(Box<dyn Write + Send>),
}

impl OutputSink {
	pub fn stdout(initial: impl Into<String>) -> Self {
		Self {
			html: initial.into(),
			destination: Destination::Stdout,
		}
	}

	/// Creates the file right away so a bad path fails before connecting.
	pub fn file(path: &Path, initial: impl Into<String>) -> Result<Self> {
		let sink = Self {
			html: initial.into(),
			destination: Destination::File(path.to_path_buf()),
		};
		sink.write_file(path).map_err(|source| CliError::Output {
			path: path.to_path_buf(),
			source,
		})?;
		Ok(sink)
	}

	pub fn writer(writer: impl Write + Send + 'static, initial: impl Into<String>) -> Self {
		Self {
			html: initial.into(),
			destination: Destination::Writer(Box::new(writer)),
		}
	}

	fn write_file(&self, path: &Path) -> io::Result<()> {
		let mut file = File::create(path)?;
		file.write_all(self.html.as_bytes())?;
		file.flush()
	}

	fn emit(&mut self) -> io::Result<()> {
		match &mut self.destination {
			Destination::Stdout => {
				let mut out = io::stdout().lock();
				writeln!(out, "{}\n", self.html)?;
				out.flush()
			}
			Destination::File(path) => {
				let path = path.clone();
				self.write_file(&path)
			}
			Destination::Writer(writer) => {
				writeln!(writer, "{}\n", self.html)?;
				writer.flush()
			}
		}
	}
}

impl ViewSink for OutputSink {
	fn replace(&mut self, html: &str) {
		self.html.clear();
		self.html.push_str(html);
		if let Err(e) = self.emit() {
			tracing::warn!("Failed to write view: {}", e);
		}
	}

	fn content(&self) -> &str {
		&self.html
	}
}
