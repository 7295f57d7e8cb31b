//! Axum route handlers behind the owner PWA.

use std::convert::Infallible;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::bots::store::{BotStore, ToggleField};
use crate::bots::updater::{clear_pending_action, mark_activated, set_tone};
use crate::dashboard::alerts::{AlertSignal, AlertWatcher};
use crate::dashboard::knowledge::{extract_text, knowledge_entry, UPLOAD_ERROR};
use crate::dashboard::license::{keys_match, ACTIVATION_ERROR};
use crate::dashboard::view::{ClientView, ViewState};
use crate::errors::AppError;
use crate::models::bot::BotRecord;
use crate::state::AppState;

/// Prefix stored in front of every owner directive.
const DIRECTIVE_PREFIX: &str = "توجيه المالك: ";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub license_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ToneRequest {
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    pub appended_chars: usize,
    pub message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load_bot(store: &dyn BotStore, bot_id: &str) -> Result<BotRecord, AppError> {
    store
        .get(bot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bot {bot_id} not found")))
}

/// Loads the bot and checks it has been activated.
async fn load_unlocked(store: &dyn BotStore, bot_id: &str) -> Result<(BotRecord, ViewState), AppError> {
    let bot = load_bot(store, bot_id).await?;
    let view = ViewState::for_record(&bot, Utc::now());
    if view == ViewState::Locked {
        return Err(AppError::Forbidden("Bot is not activated".to_string()));
    }
    Ok((bot, view))
}

/// Loads the bot and checks the owner controls are live (unlocked, not expired).
async fn load_controllable(store: &dyn BotStore, bot_id: &str) -> Result<BotRecord, AppError> {
    let (bot, view) = load_unlocked(store, bot_id).await?;
    if view.is_expired() {
        return Err(AppError::SubscriptionExpired);
    }
    Ok(bot)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/bots/:id/view
pub async fn handle_get_view(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> Result<Json<ClientView>, AppError> {
    let bot = load_bot(state.store.as_ref(), &bot_id).await?;
    Ok(Json(ClientView::build(&bot, Utc::now())))
}

/// POST /api/bots/:id/activate
///
/// Compares the entered key with the stored one after normalization.
/// Activating an already activated bot just returns its view.
pub async fn handle_activate(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ClientView>, AppError> {
    let store = state.store.as_ref();
    let bot = load_bot(store, &bot_id).await?;

    if bot.is_activated {
        return Ok(Json(ClientView::build(&bot, Utc::now())));
    }

    if !keys_match(&request.license_key, bot.license_key.as_deref()) {
        return Err(AppError::InvalidLicense(ACTIVATION_ERROR.to_string()));
    }

    mark_activated(store, &bot_id, Utc::now()).await?;
    info!("Bot {bot_id} activated");

    let bot = load_bot(store, &bot_id).await?;
    Ok(Json(ClientView::build(&bot, Utc::now())))
}

/// POST /api/bots/:id/status/toggle
pub async fn handle_toggle_status(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> Result<Json<ToggleResponse>, AppError> {
    toggle(&state, &bot_id, ToggleField::Active).await
}

/// POST /api/bots/:id/listening/toggle
pub async fn handle_toggle_listening(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> Result<Json<ToggleResponse>, AppError> {
    toggle(&state, &bot_id, ToggleField::Listening).await
}

async fn toggle(
    state: &AppState,
    bot_id: &str,
    field: ToggleField,
) -> Result<Json<ToggleResponse>, AppError> {
    load_controllable(state.store.as_ref(), bot_id).await?;
    let enabled = state.store.toggle(bot_id, field).await?;
    info!("Bot {bot_id}: {} -> {enabled}", field.document_key());
    Ok(Json(ToggleResponse { enabled }))
}

/// PUT /api/bots/:id/tone
pub async fn handle_set_tone(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    Json(request): Json<ToneRequest>,
) -> Result<StatusCode, AppError> {
    let tone = u8::try_from(request.value)
        .ok()
        .filter(|tone| *tone <= 100)
        .ok_or_else(|| AppError::Validation("tone value must be between 0 and 100".to_string()))?;

    load_unlocked(state.store.as_ref(), &bot_id).await?;
    set_tone(state.store.as_ref(), &bot_id, tone).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/bots/:id/commands
///
/// Stores a free-text owner directive among the bot's learned observations.
pub async fn handle_send_command(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<StatusCode, AppError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    load_unlocked(state.store.as_ref(), &bot_id).await?;
    state
        .store
        .append_observation(&bot_id, &format!("{DIRECTIVE_PREFIX}{text}"))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/bots/:id/knowledge (multipart, field `file`)
pub async fn handle_upload_knowledge(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    load_unlocked(state.store.as_ref(), &bot_id).await?;

    let upload_failed = || AppError::Validation(UPLOAD_ERROR.to_string());

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed knowledge upload for bot {bot_id}: {e}");
        upload_failed()
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Reading knowledge upload for bot {bot_id} failed: {e}");
            upload_failed()
        })?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(upload_failed)?;

    // PDF extraction is CPU-bound and can panic on malformed documents.
    let name = file_name.clone();
    let content = tokio::task::spawn_blocking(move || extract_text(&name, &bytes))
        .await
        .map_err(|e| {
            warn!("Text extraction for bot {bot_id} aborted: {e}");
            upload_failed()
        })?
        .map_err(|e| {
            warn!("Knowledge upload for bot {bot_id} rejected: {e}");
            upload_failed()
        })?;

    let entry = knowledge_entry(&file_name, &content);
    state.store.append_knowledge(&bot_id, &entry).await?;
    info!(
        "Appended {} chars from {file_name} to bot {bot_id} knowledge base",
        entry.chars().count()
    );

    Ok(Json(UploadResponse {
        appended_chars: entry.chars().count(),
        message: format!("تم استيعاب {file_name} بنجاح ✅"),
        file_name,
    }))
}

/// DELETE /api/bots/:id/pending-action
///
/// Dismisses the current alert. Open alert streams see the cleared record
/// and tell their clients to stop ringing.
pub async fn handle_dismiss_alert(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> Result<StatusCode, AppError> {
    load_unlocked(state.store.as_ref(), &bot_id).await?;
    clear_pending_action(state.store.as_ref(), &bot_id).await?;
    info!("Pending action dismissed for bot {bot_id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/bots/:id/alerts
///
/// Server-sent events: `alert` when a new hot lead arrives, `alert_cleared`
/// when it goes away. The stream ends when the bot stops being controllable.
pub async fn handle_alert_stream(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    load_controllable(state.store.as_ref(), &bot_id).await?;

    let (snapshots_tx, mut snapshots_rx) = mpsc::unbounded_channel::<BotRecord>();
    let subscription = state
        .store
        .subscribe(
            &bot_id,
            Box::new(move |record| {
                let _ = snapshots_tx.send(record);
            }),
        )
        .await?;

    let (events_tx, events_rx) = mpsc::channel::<Event>(16);

    tokio::spawn(async move {
        let mut watcher = AlertWatcher::default();

        loop {
            let snapshot = tokio::select! {
                _ = events_tx.closed() => break,
                snapshot = snapshots_rx.recv() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };

            let live = ViewState::for_record(&snapshot, Utc::now()).controls_enabled();
            let signal = if live {
                watcher.observe(&snapshot)
            } else {
                watcher.dismiss()
            };

            if let Some(signal) = signal {
                if events_tx.send(alert_event(&signal)).await.is_err() {
                    break;
                }
            }
            if !live {
                info!("Bot {bot_id} no longer controllable; closing alert stream");
                break;
            }
        }

        subscription.cancel();
        debug!("Alert stream for bot {bot_id} finished");
    });

    let stream = ReceiverStream::new(events_rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn alert_event(signal: &AlertSignal) -> Event {
    let name = match signal {
        AlertSignal::Raise { .. } => "alert",
        AlertSignal::Clear => "alert_cleared",
    };
    Event::default()
        .event(name)
        .json_data(signal)
        .unwrap_or_else(|e| {
            warn!("Could not encode {name} event: {e}");
            Event::default().event(name)
        })
}
