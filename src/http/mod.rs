mod error;
mod request;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use log::info;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub use error::ApiError;
pub use request::{FieldError, SendBody, ValidationError};

use crate::{
    relay::{Relay, SendReceipt},
    sent::SentCopyStore,
    smtp::MailTransport,
};

pub fn router<T: MailTransport, S: SentCopyStore>(relay: Arc<Relay<T, S>>) -> Router {
    Router::new()
        .route("/send", post(send::<T, S>))
        .route("/health", get(health))
        .with_state(relay)
}

/// Serves the relay until Ctrl-C is received.
pub async fn serve(address: SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                log::error!("could not listen for Ctrl-C: {error}");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await
}

async fn send<T: MailTransport, S: SentCopyStore>(
    State(relay): State<Arc<Relay<T, S>>>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<Json<SendReceipt>, ApiError> {
    let Json(body) = body?;
    let request = body.validate()?;
    Ok(Json(relay.send(request).await?))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
