use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use dareboard_types::api::{
    ActionResult, Claims, FriendRequestResponse, RelationshipStatusResponse, UnfriendResponse,
};
use dareboard_types::events::ChangeNotice;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let graph = blocking(move || social.relationship_graph(claims.sub)).await?;
    Ok(Json(graph.to_response()))
}

pub async fn relationship_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let status = blocking(move || social.relationship_status(claims.sub, user_id)).await?;
    Ok(Json(RelationshipStatusResponse { user_id, status }))
}

pub async fn send_request(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let outcome = blocking(move || social.send_friend_request(claims.sub, user_id)).await?;

    notify(&state, claims.sub, user_id);
    Ok(Json(FriendRequestResponse {
        success: true,
        outcome,
    }))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    blocking(move || social.accept_friend_request(claims.sub, user_id)).await?;

    notify(&state, claims.sub, user_id);
    Ok(Json(ActionResult::ok()))
}

pub async fn ignore_request(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    blocking(move || social.ignore_friend_request(claims.sub, user_id)).await?;

    notify(&state, claims.sub, user_id);
    Ok(Json(ActionResult::ok()))
}

pub async fn unfriend(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let removed = blocking(move || social.unfriend(claims.sub, user_id)).await?;

    if removed > 0 {
        notify(&state, claims.sub, user_id);
    }
    Ok(Json(UnfriendResponse {
        success: true,
        removed,
    }))
}

fn notify(state: &AppState, a: Uuid, b: Uuid) {
    state
        .dispatcher
        .broadcast(ChangeNotice::Relationships { users: [a, b] });
}
