pub mod auth;
pub mod challenges;
pub mod error;
pub mod friends;
pub mod middleware;
pub mod profiles;
pub mod tasks;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use serde_json::json;

use auth::AppState;
use middleware::require_auth;

/// REST surface. `/health` is public; everything else needs a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/profile", put(profiles::upsert_profile))
        .route("/profiles/{user_id}", get(profiles::get_profile))
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/{task_id}/execute", post(tasks::execute_task))
        .route("/tasks/{task_id}/challenges", get(tasks::task_challenges))
        .route("/executions/{execution_id}/complete", post(tasks::complete_execution))
        .route("/friends", get(friends::list_friends))
        .route("/friends/{user_id}", delete(friends::unfriend))
        .route("/friends/{user_id}/status", get(friends::relationship_status))
        .route("/friends/{user_id}/request", post(friends::send_request))
        .route("/friends/{user_id}/accept", post(friends::accept_request))
        .route("/friends/{user_id}/ignore", post(friends::ignore_request))
        .route("/challenges", get(challenges::list_challenges).post(challenges::send_challenge))
        .route("/challenges/pending", get(challenges::pending_invite))
        .route("/challenges/{invite_id}/accept", post(challenges::accept_challenge))
        .route("/challenges/{invite_id}/decline", post(challenges::decline_challenge))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
