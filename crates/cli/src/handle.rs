//! The process-wide application context.
//!
//! Library code receives its [`Cinder`] explicitly; only the binary keeps
//! one installed for the lifetime of the process.

use std::sync::OnceLock;

use cinder_runtime::Cinder;

use crate::error::{CliError, Result};

static CINDER: OnceLock<Cinder> = OnceLock::new();

/// Installs the process-wide context. Fails if one is already installed.
pub fn install(cinder: Cinder) -> Result<&'static Cinder> {
	CINDER.set(cinder).map_err(|_| CliError::HandleInstalled)?;
	CINDER.get().ok_or(CliError::HandleInstalled)
}
