//! Attach to a page's session and follow its rerenders.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cinder_runtime::{Cinder, Dispatcher, MemoryHistory, Session, SessionConfig, ViewSink, WebSocketConnector};
use tracing::info;

use crate::cli::AttachArgs;
use crate::components::register_builtin;
use crate::error::Result;
use crate::handle;
use crate::page::PageTarget;
use crate::sink::OutputSink;

pub async fn execute(args: AttachArgs) -> Result<()> {
	let target = PageTarget::resolve(&args.page).await?;
	let initial = target.main.clone().unwrap_or_default();
	let sink = match &args.output {
		Some(path) => OutputSink::file(path, initial)?,
		None => OutputSink::stdout(initial),
	};
	run(target, sink, &args).await
}

async fn run(target: PageTarget, sink: impl ViewSink + 'static, args: &AttachArgs) -> Result<()> {
	let reply_timeout = Duration::from_millis(args.reply_timeout_ms);
	let config = SessionConfig::new(target.endpoint.clone())
		.with_path(target.path.clone())
		.with_reply_timeout(reply_timeout)
		.with_handshake_timeout(reply_timeout);

	let mut dispatcher = Dispatcher::new(sink);
	register_builtin(&mut dispatcher);
	let dispatcher = Arc::new(dispatcher);

	let (session, driver) = Session::spawn(config, Arc::new(WebSocketConnector::new()), dispatcher.clone());
	let cinder = handle::install(Cinder::new(
		&session,
		Arc::new(MemoryHistory::starting_at(target.path.clone())),
	))?;
	dispatcher.attach(cinder.clone());
	dispatcher.rebind_components();

	info!(page = %target.page_url, endpoint = %target.endpoint, "Attaching");
	session.connect(target.request_id.clone()).await?;
	info!(request_id = %session.request_id(), "Attached, following rerenders (Ctrl-C to stop)");

	if let Some(path) = &args.navigate {
		cinder.transition_to(path);
	}

	tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
	info!("Interrupted, closing session");

	session.shutdown();
	driver.await.context("session driver panicked")?;
	Ok(())
}
