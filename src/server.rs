//! HTTP surface.
//!
//! Every request is dispatched by exact path through [`crate::router::resolve`].
//! Responses never carry a body: 204 on success, 404 for unknown paths and 500
//! when any step of the command failed.

use crate::orchestrator::ControllerHandle;
use crate::router;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;

#[derive(Clone)]
struct AppState {
    controller: ControllerHandle,
}

pub fn app(controller: ControllerHandle) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(AppState { controller })
}

async fn dispatch(State(state): State<AppState>, uri: Uri) -> StatusCode {
    let path = uri.path();
    let Some(action) = router::resolve(path) else {
        return StatusCode::NOT_FOUND;
    };
    log::info!("{path} -> {action:?}");
    match state.controller.submit(action).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            log::error!("{path} failed: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn serve(
    listener: TcpListener,
    controller: ControllerHandle,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app(controller))
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")
}
