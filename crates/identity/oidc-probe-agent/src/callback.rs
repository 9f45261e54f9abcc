//! One-shot loopback listener for the authorization redirect.

use crate::error::{AgentError, AgentResult};
use axum::Router;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

/// Query parameters delivered to the redirect URI.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Serve the redirect URI's path on its loopback address until exactly one
/// callback arrives, then shut down and return its parameters.
pub(crate) async fn wait_for_callback(
    redirect_uri: &str,
    timeout: Option<Duration>,
) -> AgentResult<CallbackParams> {
    let url = Url::parse(redirect_uri)?;
    let host = url
        .host_str()
        .ok_or_else(|| AgentError::Callback(format!("redirect URI has no host: {redirect_uri}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AgentError::Callback(format!("redirect URI has no port: {redirect_uri}")))?;
    let path = if url.path().is_empty() { "/" } else { url.path() };

    let (params_tx, params_rx) = oneshot::channel::<CallbackParams>();
    let (done_tx, done_rx) = oneshot::channel::<()>();
    let slots = Arc::new(Mutex::new(Some((params_tx, done_tx))));

    let app = Router::new().route(
        path,
        get(move |Query(params): Query<CallbackParams>| {
            let slots = slots.clone();
            async move {
                if let Some((params_tx, done_tx)) = slots.lock().ok().and_then(|mut s| s.take()) {
                    let _ = params_tx.send(params);
                    let _ = done_tx.send(());
                }
                Html("<html><body>You can return to the console.</body></html>")
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    debug!(%redirect_uri, "callback listener bound");

    let server = tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = done_rx.await;
        });
        if let Err(e) = serve.await {
            debug!(error = %e, "callback listener ended with error");
        }
    });

    let params = match timeout {
        Some(limit) => tokio::time::timeout(limit, params_rx)
            .await
            .map_err(|_| {
                server.abort();
                AgentError::Timeout
            })?
            .map_err(|_| AgentError::Callback("callback listener closed".to_string()))?,
        None => params_rx
            .await
            .map_err(|_| AgentError::Callback("callback listener closed".to_string()))?,
    };

    Ok(params)
}
