//! GET / - the Users table

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Router};
use tracing::{debug, warn};
use vaultview_core::error_chain;

use crate::db::DbError;
use crate::error::ServerResult;
use crate::state::AppState;
use crate::views::IndexContext;

/// GET /
///
/// Query failures render the error view; only a broken template escapes as
/// a [`ServerError`](crate::error::ServerError).
async fn index(State(state): State<AppState>) -> ServerResult<Response> {
    match state.rows().fetch_users().await {
        Ok(result) => {
            debug!(
                columns = result.columns.len(),
                rows = result.rows.len(),
                "Rendering users"
            );
            let page = state.views().render_index(&IndexContext {
                columns: &result.columns,
                rows: &result.rows,
                connection_string: state.exposed_connection_string(),
            })?;
            Ok(Html(page).into_response())
        }
        Err(err) => {
            let message = error_chain(&err);
            warn!(error = %message, "Failed to load users");
            let status = match err {
                DbError::UnsupportedFormat | DbError::Connect(_) => StatusCode::SERVICE_UNAVAILABLE,
                DbError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let page = state.views().render_error(&message)?;
            Ok((status, Html(page)).into_response())
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}
