use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Registration fields as received; text fields are validated by the flow, files are local
/// temp paths of the staged multipart parts.
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub fullname: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<PathBuf>,
    pub cover_image: Option<PathBuf>,
}

/// Request body for login (JSON or urlencoded).
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Payload returned after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub fullname: String,
    pub access_token: String,
    pub refresh_token: String,
}
