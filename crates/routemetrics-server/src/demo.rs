//! Demo routes exercising the instrumentation: a parameterized route, a
//! tail route and a body echo.

use axum::{extract::Path, Json};
use bytes::Bytes;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

/// `GET /v1/users/{id}`. Id 0 does not exist.
pub async fn get_user(Path(id): Path<String>) -> Result<Json<User>, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("user id must be numeric: {id}")))?;
    if id == 0 {
        return Err(ApiError::NotFound(format!("user {id}")));
    }
    Ok(Json(User {
        id,
        name: format!("user-{id}"),
    }))
}

/// `GET /v1/files/{*path}`.
pub async fn get_file(Path(path): Path<String>) -> String {
    format!("file: {path}\n")
}

/// `POST /v1/echo`.
pub async fn echo(body: Bytes) -> Bytes {
    body
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("no such route".into())
}
