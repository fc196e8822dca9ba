// src/serve.rs

//! Development web server.
//!
//! Serves the active output root, plus:
//! - `GET /livereload`: websocket that receives a `reload` text frame after
//!   every successful rebuild
//! - `GET /livereload.js`: client snippet pages can include to connect

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use crate::config::ServerSettings;
use crate::reload::{Reloader, RELOAD_MESSAGE};

const CLIENT_SCRIPT: &str = r#"(function () {
  var socket = new WebSocket("ws://" + location.host + "/livereload");
  socket.addEventListener("message", function (event) {
    if (event.data === "reload") {
      window.location.reload();
    }
  });
})();
"#;

/// Build the router serving `root`.
pub fn router(root: impl Into<PathBuf>, reloader: Reloader) -> Router {
    Router::new()
        .route("/livereload", get(livereload))
        .route("/livereload.js", get(client_script))
        .fallback_service(ServeDir::new(root.into()))
        .with_state(reloader)
}

/// Bind `settings.host:settings.port` and serve until the process ends.
pub async fn serve(settings: &ServerSettings, root: PathBuf, reloader: Reloader) -> Result<()> {
    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .with_context(|| format!("binding dev server to {}:{}", settings.host, settings.port))?;

    info!(url = %settings.url(), root = ?root, "dev server listening");
    axum::serve(listener, router(root, reloader))
        .await
        .context("dev server stopped")?;
    Ok(())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_SCRIPT)
}

async fn livereload(ws: WebSocketUpgrade, State(reloader): State<Reloader>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_reloads(socket, reloader))
}

async fn forward_reloads(mut socket: WebSocket, reloader: Reloader) {
    let mut rx = reloader.subscribe();
    debug!("live-reload client connected");

    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!(task = %event.task, "pushing reload");
                if socket.send(Message::Text(RELOAD_MESSAGE.into())).await.is_err() {
                    break;
                }
            }
            // A burst of rebuilds still means one reload.
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    debug!("live-reload client disconnected");
}
