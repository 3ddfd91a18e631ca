//! WebSocket transport for the session core
//!
//! Each upgraded socket gets its own task. The task owns the receiving half of
//! the connection's outbound channel and multiplexes it with the socket in a
//! single `select!` loop: queued server messages are encoded and written out,
//! inbound text frames are decoded and handed to [`SessionCore`]. When either
//! side goes away the connection is deregistered.

use crate::config::ServerConfig;
use crate::session::SessionCore;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use log::{debug, error, info};
use serde::Deserialize;
use shared::ClientMessage;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid allowed origin: {0}")]
    InvalidOrigin(String),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub name: Option<String>,
}

/// Bound listener plus the session core it serves
pub struct Server {
    listener: TcpListener,
    core: SessionCore,
    router: Router,
}

impl Server {
    /// Binds the listening socket and starts the session core.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let core = SessionCore::start(config);
        let router = router(core.clone(), &config.allowed_origin)?;

        info!("Server listening on {}", addr);
        Ok(Self {
            listener,
            core,
            router,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    /// Serves connections until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}

/// Builds the HTTP routes: `/ws` for game traffic and `/health` for liveness checks.
pub fn router(core: SessionCore, allowed_origin: &str) -> Result<Router, ServerError> {
    let origin = allowed_origin
        .parse::<HeaderValue>()
        .map_err(|_| ServerError::InvalidOrigin(allowed_origin.to_string()))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(core))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(core): State<SessionCore>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, core, params.name))
}

async fn handle_socket(mut socket: WebSocket, core: SessionCore, name: Option<String>) {
    let (tx, mut rx) = mpsc::channel(core.outbound_capacity());
    let (connection_id, player_id) = core.connect(name.as_deref(), tx).await;
    info!("Client {} connected as player {}", connection_id, player_id);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                // The registry holds the only sender, so None means we were closed.
                let Some(message) = outbound else {
                    debug!("Outbound channel of connection {} closed", connection_id);
                    break;
                };
                match message.encode() {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Failed to encode {}: {}", message.kind(), e),
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match ClientMessage::decode(text.as_str()) {
                        Ok(Some(message)) => core.handle_message(connection_id, message).await,
                        Ok(None) => debug!("Ignoring unknown message from connection {}", connection_id),
                        Err(e) => debug!("Dropping malformed message from connection {}: {}", connection_id, e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Read error on connection {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    }

    core.disconnect(connection_id).await;
    info!("Client {} disconnected", connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_without_name() {
        let params: ConnectParams = serde_json::from_str("{}").unwrap();
        assert!(params.name.is_none());
    }

    #[tokio::test]
    async fn test_router_rejects_invalid_origin() {
        let core = SessionCore::start(&ServerConfig::default());
        let result = router(core, "not a\nheader");
        assert!(matches!(result, Err(ServerError::InvalidOrigin(_))));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.core().connection_count().await, 0);
    }
}
