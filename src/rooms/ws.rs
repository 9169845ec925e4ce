use std::{sync::Arc, time::Duration};

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::{
    AppState,
    broker::{Broker, Outbound, OutboundRx},
    config::Config,
    rooms::msg,
};

/// How long a closing connection gets to flush what is already queued.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[debug_handler(state = AppState)]
pub async fn room_ws(
    State(broker): State<Broker>,
    State(config): State<Arc<Config>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| serve(stream, broker, config))
}

async fn serve(stream: WebSocket, broker: Broker, config: Arc<Config>) {
    let (outbound, OutboundRx { mut frames, close }) = Outbound::channel(config.outbound_capacity);
    let session = broker.accept(outbound.clone()).await;
    let (mut sender, mut receiver) = stream.split();

    let ping_interval = config.ping_interval;
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        ping.tick().await;

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        return;
                    }
                }
            }
        }

        let _ = sender.send(Message::Close(None)).await;
    });

    loop {
        let next = tokio::select! {
            _ = close.notified() => {
                tracing::info!(%session, "closing connection at the broker's request");
                break;
            }
            next = tokio::time::timeout(config.idle_timeout, receiver.next()) => next,
        };

        let msg = match next {
            Err(_) => {
                tracing::info!(%session, "closing idle connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(%session, "websocket read failed: {e}");
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(text) => msg::dispatch(&broker, session, &outbound, text.as_str()).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => msg::dispatch(&broker, session, &outbound, text).await,
                Err(_) => tracing::debug!(%session, "dropping non-utf8 binary frame"),
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    broker.release(session).await;
    drop(outbound);

    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
}
