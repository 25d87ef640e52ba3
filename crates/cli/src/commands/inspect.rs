//! Print what `attach` would connect to, without connecting.

use crate::cli::InspectArgs;
use crate::error::Result;
use crate::page::PageTarget;

pub async fn execute(args: InspectArgs) -> Result<()> {
	let target = PageTarget::resolve(&args.page).await?;
	println!("{}", serde_json::to_string_pretty(&target)?);
	Ok(())
}
