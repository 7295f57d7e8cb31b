use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::bots::store::StoreError;
use crate::bots::updater::{instagram_link, link_instagram};
use crate::graph::exchange::{link_account, ExchangeError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// The bot id, round-tripped through the authorization dialog.
    pub state: Option<String>,
}

/// Failures of the callback. Rendered as plain text because the browser
/// lands on this URL directly.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Missing code or state")]
    MissingParams,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("Internal Error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let status = match &self {
            CallbackError::MissingParams => StatusCode::BAD_REQUEST,
            CallbackError::Exchange(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            CallbackError::Exchange(_) | CallbackError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        tracing::error!("OAuth callback error: {self}");
        (status, self.to_string()).into_response()
    }
}

/// GET /api/instagram/oauth/callback?code=…&state=…
///
/// Runs the exchange chain, persists the link, then sends the browser back
/// to the dashboard with `?success=true`.
pub async fn handle_oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, CallbackError> {
    let (code, bot_id) = match (non_empty(query.code), non_empty(query.state)) {
        (Some(code), Some(bot_id)) => (code, bot_id),
        _ => return Err(CallbackError::MissingParams),
    };

    info!("OAuth callback for bot {bot_id}");

    let result = link_account(&state.graph, &code, &state.config.oauth_redirect_uri()).await?;

    let link = instagram_link(&result, Utc::now());
    link_instagram(state.store.as_ref(), &bot_id, &link).await?;

    Ok(Redirect::to(&state.config.oauth_success_url()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
