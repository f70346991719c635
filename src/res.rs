use axum::{extract::{FromRequest, FromRequestParts}, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

use crate::AppError;

/// JSON body extractor whose rejections come back as validation envelopes.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor; a segment that fails to parse is reported against its
/// route parameter name.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(Debug, Serialize)]
struct Envelope<'a, T> {
    status: &'static str,
    message: &'a str,
    data: T,
}

/// `{status: "success", message, data}` with the given status code.
pub fn success<T: Serialize>(code: StatusCode, message: &str, data: T) -> Response {
    (
        code,
        Json(Envelope { status: "success", message, data }),
    )
        .into_response()
}

pub fn ok<T: Serialize>(message: &str, data: T) -> Response {
    success(StatusCode::OK, message, data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    success(StatusCode::CREATED, message, data)
}
