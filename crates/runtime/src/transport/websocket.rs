//! WebSocket transport over `tokio-tungstenite`.

use std::future::Future;
use std::pin::Pin;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use super::{Connector, TransportEvent, TransportParts};
use crate::error::{Error, Result};

/// Opens WebSocket connections to `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
	pub fn new() -> Self {
		Self
	}
}

impl Connector for WebSocketConnector {
	fn open<'a>(
		&'a self,
		endpoint: &'a Url,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			tracing::debug!(%endpoint, "Opening WebSocket");

			let (stream, _response) = connect_async(endpoint.as_str())
				.await
				.map_err(|e| Error::ConnectionFailed(format!("{endpoint}: {e}")))?;

			let (mut sink, mut source) = stream.split();
			let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
			let (events_tx, events_rx) = mpsc::unbounded_channel();

			let writer_events = events_tx.clone();
			tokio::spawn(async move {
				while let Some(frame) = outbound_rx.recv().await {
					if let Err(e) = sink.send(WsMessage::Text(frame)).await {
						tracing::error!("WebSocket write error: {}", e);
						let _ = writer_events.send(TransportEvent::Error(e.to_string()));
						return;
					}
				}
				// Outbound sender dropped: the session abandoned this channel.
				let _ = sink.send(WsMessage::Close(None)).await;
				let _ = sink.close().await;
			});

			tokio::spawn(async move {
				let reason = loop {
					match source.next().await {
						Some(Ok(WsMessage::Text(text))) => {
							let _ = events_tx.send(TransportEvent::Frame(text));
						}
						Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
							Ok(text) => {
								let _ = events_tx.send(TransportEvent::Frame(text));
							}
							Err(_) => tracing::debug!("Non UTF-8 binary frame (ignored)"),
						},
						Some(Ok(WsMessage::Close(frame))) => {
							break frame.map(|f| f.reason.into_owned());
						}
						Some(Ok(_)) => {}
						Some(Err(e)) => {
							tracing::debug!("WebSocket read error: {}", e);
							let _ = events_tx.send(TransportEvent::Error(e.to_string()));
							break None;
						}
						None => break None,
					}
				};
				let _ = events_tx.send(TransportEvent::Closed(reason));
			});

			Ok(TransportParts {
				outbound: outbound_tx,
				events: events_rx,
			})
		})
	}
}
