pub mod attach;
pub mod inspect;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Attach(args) => attach::execute(args).await,
		Commands::Inspect(args) => inspect::execute(args).await,
	}
}
