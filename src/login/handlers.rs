use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Form;
use serde::Deserialize;
use std::sync::Arc;

use super::oauth2::{decode_state, encode_state, state_nonce};
use super::LoginError;
use crate::response::{
    json_error, json_response, redirect_response, redirect_with_cookie, redirect_with_cookies,
};
use crate::AppState;

const ACCOUNT_PATH: &str = "/auth/account";

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /login
pub async fn login_page() -> Html<&'static str> {
    Html(
        r#"<form method="post" action="/login_submit">
<input name="email" type="email"><input name="password" type="password">
<button type="submit">Log in</button></form>
<a href="/api/auth/thirdparty/oauth2">Log in with OAuth2</a> | <a href="/signup">Sign up</a>"#,
    )
}

/// GET /signup
pub async fn signup_page() -> Html<&'static str> {
    Html(
        r#"<form method="post" action="/users/signup">
<input name="name"><input name="email" type="email"><input name="username">
<input name="password" type="password"><button type="submit">Sign up</button></form>"#,
    )
}

/// POST /users/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Response<Body> {
    let username = form.username.as_deref().unwrap_or(&form.email);
    match state
        .accounts
        .signup(&form.name, username, &form.email, &form.password)
        .await
    {
        Ok(_) => redirect_response(StatusCode::FOUND, "/login"),
        Err(e) => e.into_response(),
    }
}

/// POST /login_submit
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Response<Body> {
    let account = match state
        .accounts
        .verify_credentials(&form.email, &form.password)
        .await
    {
        Ok(account) => account,
        Err(e) => {
            tracing::info!("Local login failed for {}: {}", form.email, e);
            return e.into_response();
        }
    };

    let data = state.session_manager.session_for(&account, None);
    match state.session_manager.create_session(data).await {
        Ok(cookie) => redirect_with_cookie(StatusCode::FOUND, ACCOUNT_PATH, &cookie),
        Err(e) => e.into_response(),
    }
}

/// GET /auth/account
pub async fn account(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response<Body> {
    let account = match state.session_manager.current_session(&headers).await {
        Some((_, session)) => state.accounts.get(session.user_id).await,
        None => None,
    };

    match account {
        Some(account) => json_response(StatusCode::OK, &account),
        None => json_error(StatusCode::UNAUTHORIZED, "Authentication required"),
    }
}

/// GET /logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response<Body> {
    if let Some(id) = state.session_manager.extract_session_id(&headers) {
        state.session_manager.destroy_session(&id).await;
    }
    redirect_with_cookie(StatusCode::FOUND, "/", &state.session_manager.clear_cookie())
}

/// GET /api/auth/thirdparty/:provider
///
/// Redirects the browser to the provider's authorization dialog. The state
/// nonce is also set as a cookie for the callback to check.
pub async fn thirdparty_login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Response<Body> {
    let Some(client) = state.oauth2_clients.get(&provider) else {
        return LoginError::UnknownProvider(provider).into_response();
    };

    let oauth_state = encode_state(ACCOUNT_PATH);
    let Some(nonce) = state_nonce(&oauth_state) else {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create OAuth state");
    };
    let state_cookie = state.session_manager.state_cookie(nonce);

    let url = client.authorization_url(&oauth_state);
    redirect_with_cookie(StatusCode::SEE_OTHER, &url, &state_cookie)
}

/// GET /api/auth/thirdparty/:provider/callback?code=...&state=...
///
/// Checks the state nonce, exchanges the code, links the profile to a local
/// account and logs it in.
pub async fn thirdparty_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response<Body> {
    let Some(client) = state.oauth2_clients.get(&provider) else {
        return LoginError::UnknownProvider(provider).into_response();
    };

    if let Some(error) = &query.error {
        let desc = query.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!("OAuth2 callback error from {}: {} ({})", provider, error, desc);
        return json_error(
            StatusCode::BAD_REQUEST,
            &format!("Authentication failed: {}", desc),
        );
    }

    let Some(code) = query.code.as_deref() else {
        return json_error(StatusCode::BAD_REQUEST, "Missing authorization code");
    };

    let oauth_state = query.state.as_deref().unwrap_or("");
    let expected = state.session_manager.extract_state_nonce(&headers);
    if expected.is_none() || state_nonce(oauth_state) != expected.as_deref() {
        tracing::warn!("OAuth2 callback from {} with unknown state", provider);
        return json_error(StatusCode::BAD_REQUEST, "Invalid OAuth state");
    }
    let redirect_url = decode_state(oauth_state, ACCOUNT_PATH);

    let tokens = match client.exchange_code(code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!("Token exchange with {} failed: {}", provider, e);
            return e.into_response();
        }
    };

    let profile = match client.fetch_profile(&tokens.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Profile fetch from {} failed: {}", provider, e);
            return e.into_response();
        }
    };

    let account = match state.accounts.link_or_create(client.name(), &profile).await {
        Ok(account) => account,
        Err(e) => return e.into_response(),
    };

    let data = state.session_manager.session_for(&account, Some(client.name()));
    match state.session_manager.create_session(data).await {
        Ok(cookie) => redirect_with_cookies(
            StatusCode::FOUND,
            &redirect_url,
            &[cookie.as_str(), &state.session_manager.clear_state_cookie()],
        ),
        Err(e) => e.into_response(),
    }
}
