use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::Result;

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> std::result::Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

/// Turn a service result into a response: `status` on success, the error's
/// own status and JSON body otherwise.
pub fn respond<T: Serialize>(status: StatusCode, result: Result<T>) -> std::result::Result<Response<Body>, Error> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(e) => e.into_response(),
    }
}

pub fn not_found() -> std::result::Result<Response<Body>, Error> {
    json_response(StatusCode::NOT_FOUND, &serde_json::json!({"error": "Not found"}))
}

pub fn method_not_allowed() -> std::result::Result<Response<Body>, Error> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({"error": "Method not allowed"}),
    )
}

pub fn cors_preflight() -> std::result::Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET,POST,PATCH,OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization,X-User-Id")
        .body(Body::Empty)
        .map_err(Box::new)?)
}
