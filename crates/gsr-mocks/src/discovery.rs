//! Discovery/redirection mock.
//!
//! Answers the agent's initial "where do I connect" query with the LNS
//! mock's URI. One request, one redirect; there are no retries, and a failed
//! discovery surfaces as a scenario timeout.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gsr_msg::discovery::{RouterInfoError, RouterInfoRequest, RouterInfoResponse};

struct DiscoveryState {
    muxs_uri: String,
}

/// Builder for the discovery endpoint.
pub struct DiscoveryServer {
    muxs_uri: String,
}

impl DiscoveryServer {
    pub fn new(muxs_uri: impl Into<String>) -> Self {
        Self {
            muxs_uri: muxs_uri.into(),
        }
    }

    /// Bind an ephemeral port and start serving redirects.
    pub async fn spawn(self) -> anyhow::Result<DiscoveryHandle> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, muxs = %self.muxs_uri, "discovery server listening");

        let state = Arc::new(DiscoveryState {
            muxs_uri: self.muxs_uri,
        });

        // The agent connects to the URI from `tc.uri` verbatim, so serve the
        // redirect on both the bare root and the conventional info path.
        let app = Router::new()
            .route("/", get(upgrade_handler))
            .route("/router-info", get(upgrade_handler))
            .with_state(state);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(err) = server.await {
                warn!(error = %err, "discovery server exited with error");
            }
        });

        Ok(DiscoveryHandle {
            address: local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle for the running discovery endpoint.
pub struct DiscoveryHandle {
    address: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DiscoveryHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// URI written into the agent's `tc.uri` pointer file.
    pub fn uri(&self) -> String {
        format!("ws://{}", self.address)
    }

    /// Trigger graceful shutdown and await completion.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(anyhow::Error::from)
    }
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DiscoveryState>>,
) -> axum::response::Response {
    ws.on_upgrade(|socket| session(socket, state))
}

async fn session(mut socket: WebSocket, state: Arc<DiscoveryState>) {
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        warn!("discovery connection closed before a request arrived");
        return;
    };

    let reply = match serde_json::from_str::<RouterInfoRequest>(&text) {
        Ok(request) => {
            info!(router = %request.router, "redirecting agent to muxs");
            serde_json::to_string(&RouterInfoResponse {
                router: request.router,
                muxs: "muxs-::0".to_owned(),
                uri: state.muxs_uri.clone(),
            })
        }
        Err(err) => {
            warn!(error = %err, "invalid router-info request");
            serde_json::to_string(&RouterInfoError {
                error: "invalid router-info request".to_owned(),
            })
        }
    };

    if let Ok(reply) = reply {
        let _ = socket.send(Message::Text(reply)).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

    #[tokio::test]
    async fn redirects_one_request_to_the_muxs_uri() {
        let handle = DiscoveryServer::new("ws://127.0.0.1:9999/router")
            .spawn()
            .await
            .unwrap();
        let url = format!("ws://{}", handle.local_addr());

        let (mut socket, _) = connect_async(&url).await.unwrap();
        socket
            .send(WsMessage::Text(r#"{"router":"::0"}"#.to_owned()))
            .await
            .unwrap();

        let reply = socket.next().await.unwrap().unwrap();
        let WsMessage::Text(payload) = reply else {
            panic!("unexpected reply: {reply:?}");
        };
        let response: RouterInfoResponse = serde_json::from_str(&payload).unwrap();
        assert_eq!(response.uri, "ws://127.0.0.1:9999/router");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_request_yields_an_error_reply() {
        let handle = DiscoveryServer::new("ws://127.0.0.1:9999/router")
            .spawn()
            .await
            .unwrap();
        let url = format!("ws://{}/router-info", handle.local_addr());

        let (mut socket, _) = connect_async(&url).await.unwrap();
        socket
            .send(WsMessage::Text("not json".to_owned()))
            .await
            .unwrap();

        let reply = socket.next().await.unwrap().unwrap();
        let WsMessage::Text(payload) = reply else {
            panic!("unexpected reply: {reply:?}");
        };
        assert!(payload.contains("error"));

        handle.shutdown().await.unwrap();
    }
}
