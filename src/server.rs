use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::aggregate::ResultsView;
use crate::config::ServeConfig;
use crate::error::SubmitError;
use crate::relay::Relay;
use crate::report::{self, NO_DATA_MESSAGE};
use crate::store::{ResultStore, SessionId};
use crate::validate;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AppState {
    pub relay: Relay,
    pub store: Arc<ResultStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/predict", post(relay_predict))
        .route("/api/fields", get(fields))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session}", delete(end_session))
        .route("/api/sessions/{session}/submit", post(submit))
        .route("/api/sessions/{session}/results", get(results_json))
        .route("/sessions/{session}/results", get(results_text))
        .with_state(state)
}

async fn relay_predict(State(state): State<AppState>, body: Bytes) -> Response {
    match state.relay.forward(body).await {
        Ok(upstream) => (
            upstream.status,
            [(header::CONTENT_TYPE, "application/json")],
            upstream.body,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn fields() -> Json<validate::FieldTable> {
    Json(validate::field_table())
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.store.create_session();
    tracing::debug!(%session, "session created");
    (StatusCode::CREATED, Json(json!({ "session": session })))
}

async fn end_session(State(state): State<AppState>, Path(session): Path<SessionId>) -> StatusCode {
    if state.store.end_session(session) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn submit(
    State(state): State<AppState>,
    Path(session): Path<SessionId>,
    Form(input): Form<HashMap<String, String>>,
) -> Result<Redirect, SubmitError> {
    if !state.store.contains(session) {
        return Err(SubmitError::UnknownSession);
    }

    let record = validate::validate_form(&input).map_err(|errors| {
        tracing::debug!(%session, invalid = errors.len(), "submission rejected");
        SubmitError::Validation(errors)
    })?;

    let _guard = state.store.begin_submission(session)?;
    let result = state.relay.score(&record).await?;
    if result.is_empty() {
        tracing::warn!(%session, "scoring service returned no models");
    }
    state.store.put(session, &result)?;

    tracing::info!(%session, models = result.len(), "prediction stored");
    Ok(Redirect::to(&format!("/sessions/{session}/results")))
}

async fn results_json(State(state): State<AppState>, Path(session): Path<SessionId>) -> Response {
    match ResultsView::mount(&state.store, session) {
        ResultsView::NoData => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": NO_DATA_MESSAGE })),
        )
            .into_response(),
        view => Json(view).into_response(),
    }
}

async fn results_text(State(state): State<AppState>, Path(session): Path<SessionId>) -> String {
    report::render_view(&ResultsView::mount(&state.store, session))
}

pub async fn serve(config: ServeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let relay = Relay::new(config.scoring.url.clone(), config.scoring.timeout)
        .context("failed to build scoring service client")?;
    let store = Arc::new(ResultStore::new(config.result_ttl, config.session_idle));
    tokio::spawn(purge_expired(store.clone(), shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!(
        listen = %config.listen,
        scoring = %config.scoring.url,
        "placement predictor ready"
    );

    axum::serve(listener, router(AppState { relay, store }))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("server stopped unexpectedly")?;

    tracing::info!("shut down");
    Ok(())
}

async fn purge_expired(store: Arc<ResultStore>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let purged = store.purge_expired();
                if !purged.is_empty() {
                    tracing::debug!(
                        results = purged.results,
                        sessions = purged.sessions,
                        "expired results and idle sessions purged"
                    );
                }
            }
        }
    }
}
