use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use msgr_types::api::{Claims, ProfileResponse, SearchQuery};
use msgr_types::models::Profile;

use crate::error::ChatError;
use crate::{AppState, run_blocking};

const SEARCH_LIMIT: u32 = 20;

fn to_response(profile: Profile) -> ProfileResponse {
    ProfileResponse {
        profile_id: profile.id,
        user_id: profile.user_id,
        display_name: profile.full_name(),
        identifier: profile.identifier,
        biography: profile.biography,
    }
}

/// `GET /users?q=TEXT` — find people to talk to.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<ProfileResponse>>, ChatError> {
    let rows = run_blocking(&state, move |db| Ok(db.search_profiles(&query.q, SEARCH_LIMIT)?)).await?;
    Ok(Json(rows.into_iter().map(|row| to_response(row.into_model())).collect()))
}

/// `GET /users/{profile_id}` — a user's public profile.
pub async fn profile(
    State(state): State<AppState>,
    Path(profile_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<ProfileResponse>, ChatError> {
    let row = run_blocking(&state, move |db| Ok(db.get_profile(profile_id)?))
        .await?
        .ok_or(ChatError::NotFound("profile"))?;
    Ok(Json(to_response(row.into_model())))
}

/// `POST /users/{profile_id}` — open (creating if needed) the chat with that
/// user and redirect to it. Targeting your own profile opens your self chat.
pub async fn start_chat(
    State(state): State<AppState>,
    Path(profile_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ChatError> {
    let actor = claims.sub;
    let chat = run_blocking(&state, move |db| {
        let target = db
            .get_profile(profile_id)?
            .ok_or(ChatError::NotFound("profile"))?
            .into_model()
            .user_id;
        Ok(db.resolve_chat(actor, target)?.into_model())
    })
    .await?;

    debug!("User {} opened chat {}", actor, chat.id);
    let location = format!("/chats/{}", chat.id);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
