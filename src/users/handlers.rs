use std::{path::Path, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{instrument, warn};

use super::{
    dto::{LoginRequest, LoginResponse, RegisterInput},
    repo_types::UserProfile,
    services::{login_user, register_user},
};
use crate::{
    auth::TokenService,
    error::ApiError,
    extractors::JsonOrForm,
    images::services::{stage_file, StagedFile},
    response::{ApiResponse, ApiResult},
    state::AppState,
};

pub fn user_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/users/register",
            post(register).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route("/users/login", post(login))
}

/// Multipart registration form with its files staged on local disk.
/// The staged files are removed when this value is dropped.
struct RegisterForm {
    input: RegisterInput,
    _staged: Vec<StagedFile>,
}

async fn read_register_form(mut mp: Multipart, temp_dir: &Path) -> Result<RegisterForm, ApiError> {
    let mut input = RegisterInput::default();
    let mut staged = Vec::new();

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "username" | "email" | "fullname" | "password" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                let slot = match name.as_str() {
                    "username" => &mut input.username,
                    "email" => &mut input.email,
                    "fullname" => &mut input.fullname,
                    _ => &mut input.password,
                };
                *slot = Some(value);
            }
            "avatar" | "coverImage" => {
                let slot = if name == "avatar" {
                    &mut input.avatar
                } else {
                    &mut input.cover_image
                };
                // Only the first file of each field is used.
                if slot.is_some() {
                    continue;
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                if data.is_empty() {
                    continue;
                }
                let file = stage_file(
                    temp_dir,
                    &name,
                    file_name.as_deref(),
                    content_type.as_deref(),
                    data,
                )
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
                *slot = Some(file.path().to_path_buf());
                staged.push(file);
            }
            other => warn!(field = %other, "ignoring unexpected multipart field"),
        }
    }

    Ok(RegisterForm {
        input,
        _staged: staged,
    })
}

/// POST /users/register (multipart: username, email, fullname, password, avatar, coverImage)
#[instrument(skip(state, mp))]
pub async fn register(State(state): State<AppState>, mp: Multipart) -> ApiResult<UserProfile> {
    let form = read_register_form(mp, &state.config.http.upload_temp_dir).await?;
    let profile = register_user(&state, form.input).await?;
    ApiResponse::with_status(
        StatusCode::CREATED,
        profile,
        "User has been registered successfully",
    )
}

/// POST /users/login ({email, password} as JSON or urlencoded)
#[instrument(skip(state, tokens, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(tokens): State<TokenService>,
    JsonOrForm(payload): JsonOrForm<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let outcome = login_user(&state, &tokens, payload).await?;

    let secure = state.config.http.cookie_secure;
    let jar = CookieJar::new()
        .add(auth_cookie(
            "accessToken",
            outcome.access_token.clone(),
            tokens.access_ttl(),
            secure,
        ))
        .add(auth_cookie(
            "refreshToken",
            outcome.refresh_token.clone(),
            tokens.refresh_ttl(),
            secure,
        ));

    let body = LoginResponse {
        fullname: outcome.user.fullname,
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
    };
    Ok((jar, ApiResponse::new(StatusCode::OK, body, "Login successful")))
}

fn auth_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .secure(secure)
        .build()
}
