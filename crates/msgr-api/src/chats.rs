use axum::{
    Extension, Form, Json,
    body::{Body, to_bytes},
    extract::{FromRequest, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use msgr_types::api::{ChatPostForm, Claims, DeleteMessageForm, HistoryQuery, PollQuery};

use crate::error::ChatError;
use crate::sync::{self, Cursors};
use crate::{AppState, guard, inbox, run_blocking};

/// `GET /chats` — the user's chat list.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ChatError> {
    let viewer = claims.sub;
    let entries = run_blocking(&state, move |db| inbox::chat_list(db, viewer)).await?;
    Ok(Json(entries).into_response())
}

/// `GET /chats/{id}` — full chat page without cursors, a poll delta with them.
pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(query): Query<PollQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ChatError> {
    let viewer = claims.sub;
    run_blocking(&state, move |db| {
        let chat = guard::authorized_chat(db, viewer, chat_id)?;
        if query.is_poll() {
            let delta = sync::poll(db, viewer, &chat, Cursors::from(query))?;
            Ok(Json(delta).into_response())
        } else {
            let page = sync::enter(db, viewer, &chat)?;
            Ok(Json(page).into_response())
        }
    })
    .await
}

/// Upper bound on a chat form body. Generous for the longest allowed message
/// after percent-encoding.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Read the body of `POST /chats/{id}`. An empty body is the exit beacon
/// (`Ok(None)` content); anything else must be a well-formed form.
async fn read_chat_form(request: Request) -> Result<Option<String>, ChatError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| ChatError::Validation(format!("Unreadable request body: {}", e)))?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let Form(form) = Form::<ChatPostForm>::from_request(request, &()).await?;
    Ok(form.content)
}

/// `POST /chats/{id}` — send when the body has `content`, otherwise record
/// that the user left the chat view.
pub async fn post_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    request: Request,
) -> Result<StatusCode, ChatError> {
    let viewer = claims.sub;
    let content = read_chat_form(request).await?;
    let max_len = state.limits.max_message_len;

    run_blocking(&state, move |db| {
        match content {
            Some(content) => {
                sync::validate_content(&content, max_len)?;
                let chat = guard::authorized_chat(db, viewer, chat_id)?;
                sync::send(db, viewer, &chat, &content)?;
            }
            None => {
                let chat = guard::authorized_chat(db, viewer, chat_id)?;
                sync::leave(db, viewer, &chat)?;
            }
        }
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// `POST /chats/delete-message` — always 204, whoever owns the message.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Form(form): Form<DeleteMessageForm>,
) -> Result<StatusCode, ChatError> {
    let viewer = claims.sub;
    run_blocking(&state, move |db| sync::delete_message(db, viewer, form.message)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /chats/{id}/messages?page=N` — older messages, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ChatError> {
    let viewer = claims.sub;
    let page_size = state.limits.history_page_size;
    run_blocking(&state, move |db| {
        let chat = guard::authorized_chat(db, viewer, chat_id)?;
        let page = inbox::history(db, viewer, &chat, query.page, page_size)?;
        Ok(Json(page).into_response())
    })
    .await
}
