use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::response::Builder;
use axum::http::{Response, StatusCode};
use serde::Serialize;

pub fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    finish(
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json"),
        Body::from(bytes),
    )
}

pub fn redirect_response(status: StatusCode, location: &str) -> Response<Body> {
    finish(
        Response::builder().status(status).header(LOCATION, location),
        Body::empty(),
    )
}

pub fn redirect_with_cookie(status: StatusCode, location: &str, cookie: &str) -> Response<Body> {
    redirect_with_cookies(status, location, &[cookie])
}

/// Redirect that sets each cookie in its own `Set-Cookie` header, in order.
pub fn redirect_with_cookies(
    status: StatusCode,
    location: &str,
    cookies: &[&str],
) -> Response<Body> {
    let builder = cookies.iter().fold(
        Response::builder().status(status).header(LOCATION, location),
        |builder, cookie| builder.header(SET_COOKIE, *cookie),
    );
    finish(builder, Body::empty())
}

/// Builder errors only come from header values we could not encode.
fn finish(builder: Builder, body: Body) -> Response<Body> {
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!("Failed to build response: {}", e);
        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        resp
    })
}
