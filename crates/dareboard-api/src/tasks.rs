use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use dareboard_types::api::{ActionResult, Claims, CompleteExecutionResponse, CreateTaskRequest};
use dareboard_types::events::ChangeNotice;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn create_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let task = blocking(move || {
        social.create_task(claims.sub, &req.title, &req.description, req.image_url.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(task.to_task())))
}

pub async fn execute_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let execution_id = blocking(move || social.execute_task(claims.sub, task_id)).await?;
    Ok((StatusCode::CREATED, Json(ActionResult::created(execution_id))))
}

/// Sent challenges for one task, newest first.
pub async fn task_challenges(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let sent = blocking(move || social.sent_challenges_for_task(claims.sub, task_id)).await?;
    Ok(Json(sent))
}

pub async fn complete_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let (completion, audience) = blocking(move || {
        let completion = social.complete_execution(claims.sub, execution_id)?;
        Ok((completion, social.profile_audience(claims.sub)?))
    })
    .await?;

    // The streak lives on the profile every peer's snapshot embeds.
    state.dispatcher.broadcast(ChangeNotice::Profiles {
        user: claims.sub,
        audience,
    });
    if let Some(invite) = completion.completed_challenge {
        state.dispatcher.broadcast(ChangeNotice::ChallengeInvites {
            users: [invite.from_user, claims.sub],
        });
    }

    Ok(Json(CompleteExecutionResponse {
        success: true,
        execution_id: completion.execution_id,
        daily_streak: completion.daily_streak,
        completed_challenge: completion.completed_challenge.map(|c| c.invite_id),
    }))
}
