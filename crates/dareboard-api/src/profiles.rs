use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use dareboard_core::Rejection;
use dareboard_types::api::{Claims, UpsertProfileRequest};
use dareboard_types::events::ChangeNotice;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Create the caller's profile on first save, otherwise update it.
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let (row, audience) = blocking(move || {
        let row = social.upsert_profile(
            claims.sub,
            &req.name,
            req.profile_image.as_deref(),
            req.avatar_color.as_deref(),
        )?;
        Ok((row, social.profile_audience(claims.sub)?))
    })
    .await?;

    state.dispatcher.broadcast(ChangeNotice::Profiles {
        user: claims.sub,
        audience,
    });
    Ok(Json(row.to_profile()))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let row = blocking(move || social.get_profile(user_id))
        .await?
        .ok_or(Rejection::UnknownUser)?;

    Ok(Json(row.to_profile()))
}
