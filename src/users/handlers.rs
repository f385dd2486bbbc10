use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::{
    dto::{CreateUserRequest, DeleteUserResponse, ListQuery, UpdateUserRequest, UserPage},
    repo_types::{NewUser, User, UserChanges},
    services::{hash_password, validate_create, validate_update, PageRequest, ValidationError},
};

const USER_NOT_FOUND: &str = "User not found";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

/// Ids that are not integers cannot match a row.
fn parse_id(raw: &str) -> ApiResult<i32> {
    raw.trim().parse::<i32>().map_err(|_| {
        debug!(id = %raw, "non-numeric user id");
        ApiError::NotFound(USER_NOT_FOUND)
    })
}

fn malformed(rejection: JsonRejection) -> ApiError {
    warn!(error = %rejection, "rejected request body");
    ValidationError::MalformedBody(rejection.body_text()).into()
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<UserPage>> {
    const FAILED: &str = "Failed to fetch users due to a server error";
    // An undecodable query string falls back to default paging like any other bad value.
    let q = match query {
        Ok(Query(pairs)) => ListQuery::from_pairs(pairs),
        Err(rejection) => {
            debug!(error = %rejection, "ignoring undecodable query string");
            ListQuery::default()
        }
    };
    let page = PageRequest::from_query(&q);

    let total = state
        .users
        .count()
        .await
        .map_err(|e| ApiError::from_repo(e, "No users found", FAILED))?;
    let data = state
        .users
        .list(page.limit, page.offset())
        .await
        .map_err(|e| ApiError::from_repo(e, "No users found", FAILED))?;

    // An empty page, including an empty table, is reported as 404.
    if data.is_empty() {
        return Err(ApiError::NotFound("No users found"));
    }

    debug!(total, page = page.page, limit = page.limit, "users fetched");
    Ok(Json(UserPage {
        data,
        pagination: page.meta(total),
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&id)?;
    let user = state.users.find(id).await.map_err(|e| {
        ApiError::from_repo(e, USER_NOT_FOUND, "Failed to fetch user due to a server error")
    })?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    const FAILED: &str = "Failed to create user due to a server error.";
    let Json(req) = payload.map_err(malformed)?;

    let input = validate_create(req).map_err(|e| {
        warn!(reason = %e, "create user rejected");
        ApiError::from(e)
    })?;

    let password_hash = hash_password(&input.password).map_err(|source| ApiError::Internal {
        context: FAILED,
        source,
    })?;

    let user = state
        .users
        .insert(NewUser {
            name: input.name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            country: input.country,
            password_hash,
        })
        .await
        .map_err(|e| ApiError::from_repo(e, USER_NOT_FOUND, FAILED))?;

    info!(user_id = user.id, email = %user.email, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    const FAILED: &str = "Failed to update user due to a server error.";
    let id = parse_id(&id)?;
    let Json(req) = payload.map_err(malformed)?;

    if let Err(e) = validate_update(&req) {
        warn!(user_id = id, reason = %e, "update user rejected");
        return Err(e.into());
    }

    let password_hash = req
        .password
        .as_deref()
        .map(hash_password)
        .transpose()
        .map_err(|source| ApiError::Internal {
            context: FAILED,
            source,
        })?;

    let changes = UserChanges {
        name: req.name,
        email: req.email,
        phone: req.phone,
        address: req.address,
        country: req.country,
        password_hash,
    };
    let user = state
        .users
        .update(id, changes)
        .await
        .map_err(|e| ApiError::from_repo(e, USER_NOT_FOUND, FAILED))?;

    info!(user_id = user.id, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let id = parse_id(&id)?;
    let deleted_user = state.users.delete(id).await.map_err(|e| {
        ApiError::from_repo(e, USER_NOT_FOUND, "Failed to delete user due to a server error.")
    })?;

    info!(user_id = deleted_user.id, "user deleted");
    Ok(Json(DeleteUserResponse {
        message: "User deleted successfully".into(),
        deleted_user,
    }))
}
