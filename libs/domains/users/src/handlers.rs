use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::UserResult;
use crate::models::{CreateUser, PatchUser, UserFilter, UserId, UserResponse};
use crate::repository::UserRepository;
use crate::service::UserService;

/// Create the users router with all HTTP endpoints
pub fn router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(shared_service)
}

/// List response; `total` counts every match, ignoring limit/offset
#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub data: Vec<UserResponse>,
    pub total: u64,
}

/// List users with optional filters
///
/// GET /users?is_active=true&limit=10&offset=0
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Query(filter): Query<UserFilter>,
) -> UserResult<Json<ListUsersResponse>> {
    let users = service.list_users(&filter).await?;
    let total = service.count_users(&filter).await?;

    Ok(Json(ListUsersResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
        total,
    }))
}

/// Create a new user
///
/// POST /users
async fn create_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Json(input): Json<CreateUser>,
) -> UserResult<impl IntoResponse> {
    let user = service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /users/{id}
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(id): Path<UserId>,
) -> UserResult<Json<UserResponse>> {
    let user = service.get_user_by_id(id).await?;
    Ok(Json(user.into()))
}

/// Update a user; omitted fields keep their stored value
///
/// PUT /users/{id}
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(id): Path<UserId>,
    Json(patch): Json<PatchUser>,
) -> UserResult<Json<UserResponse>> {
    let current = service.get_user_by_id(id).await?;
    let user = service.update_user(id, patch.merge(&current)).await?;
    Ok(Json(user.into()))
}

/// DELETE /users/{id}
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(id): Path<UserId>,
) -> UserResult<impl IntoResponse> {
    service.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
