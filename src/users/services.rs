use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, RegisterInput},
    repo_types::{NewUser, User, UserProfile},
};
use crate::{
    auth::{
        password::{hash_password_async, verify_password_async},
        TokenService,
    },
    error::ApiError,
    images::services::{discard_assets, upload_local_file},
    state::AppState,
};

const DUPLICATE_USER: &str = "A user with this email or username already exists";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, normalized registration text fields.
#[derive(Debug)]
struct RegistrationFields {
    username: String,
    email: String,
    fullname: String,
    password: String,
}

impl RegistrationFields {
    fn from_input(input: &RegisterInput) -> Result<Self, ApiError> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let username = present(&input.username);
        let email = present(&input.email);
        let fullname = present(&input.fullname);
        let password = present(&input.password);

        let missing: Vec<String> = [
            ("username", username.is_none()),
            ("email", email.is_none()),
            ("fullname", fullname.is_none()),
            ("password", password.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| format!("{name} is required"))
        .collect();

        match (username, email, fullname, password) {
            (Some(username), Some(email), Some(fullname), Some(_)) => {
                let email = email.to_lowercase();
                if !is_valid_email(&email) {
                    return Err(ApiError::validation("Invalid email"));
                }
                Ok(Self {
                    username: username.to_lowercase(),
                    email,
                    fullname,
                    // Hashed as submitted; only blank passwords are rejected.
                    password: input.password.clone().unwrap_or_default(),
                })
            }
            _ => Err(ApiError::validation("All fields are required").with_errors(missing)),
        }
    }
}

#[instrument(skip_all)]
pub async fn register_user(state: &AppState, input: RegisterInput) -> Result<UserProfile, ApiError> {
    let fields = RegistrationFields::from_input(&input).map_err(|e| {
        warn!(errors = ?e.errors(), "registration rejected: {}", e.message());
        e
    })?;

    if state
        .users
        .find_by_username_or_email(&fields.username, &fields.email)
        .await?
        .is_some()
    {
        warn!(username = %fields.username, email = %fields.email, "user already exists");
        return Err(ApiError::conflict(DUPLICATE_USER));
    }

    let Some(avatar_path) = input.avatar.as_deref() else {
        warn!(username = %fields.username, "registration without avatar");
        return Err(ApiError::validation("Avatar file is required"));
    };

    let password_hash = hash_password_async(fields.password)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let media = state.media.as_ref();
    let avatar = upload_local_file(media, Some(avatar_path)).await;
    let cover = upload_local_file(media, input.cover_image.as_deref()).await;

    let Some(avatar) = avatar else {
        if let Some(cover) = &cover {
            discard_assets(media, &[cover]).await;
        }
        return Err(ApiError::upload("Avatar upload to media store failed"));
    };

    let new_user = NewUser {
        username: fields.username,
        email: fields.email,
        fullname: fields.fullname,
        avatar: avatar.url.clone(),
        cover_image: cover.as_ref().map(|c| c.url.clone()).unwrap_or_default(),
        password_hash,
    };

    let created = match state.users.create(new_user).await {
        Ok(user) => user,
        Err(e) => {
            let mut uploaded = vec![&avatar];
            uploaded.extend(cover.as_ref());
            discard_assets(media, &uploaded).await;
            warn!(error = %e, "user create failed; uploaded assets discarded");
            return Err(e.into());
        }
    };

    let profile = state
        .users
        .find_profile_by_id(created.id)
        .await?
        .ok_or_else(|| ApiError::internal("Something went wrong while creating user in DB"))?;

    info!(user_id = %profile.id, username = %profile.username, "user registered");
    Ok(profile)
}

/// Outcome of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[instrument(skip_all)]
pub async fn login_user(
    state: &AppState,
    tokens: &TokenService,
    payload: LoginRequest,
) -> Result<LoginOutcome, ApiError> {
    let email = payload
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let password = payload.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unknown_user("You are not a registered user"));
    };

    let ok = verify_password_async(password, user.password_hash.clone())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let access_token = tokens
        .sign_access(&user)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let refresh_token = tokens
        .sign_refresh(user.id)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    state
        .users
        .set_refresh_token(user.id, Some(&refresh_token))
        .await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(LoginOutcome {
        user,
        access_token,
        refresh_token,
    })
}
