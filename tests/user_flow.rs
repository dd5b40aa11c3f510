use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use vidnest::{
    app::{build_app, API_PREFIX},
    auth::{password::verify_password, TokenService},
    state::AppState,
    test_helpers::{test_config, test_state, FakeMediaStore, InMemoryUserRepository},
};

const BOUNDARY: &str = "----vidnest-test-boundary";

struct TestApp {
    router: Router,
    users: Arc<InMemoryUserRepository>,
    media: Arc<FakeMediaStore>,
    dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with(InMemoryUserRepository::default(), FakeMediaStore::default())
    }

    fn with(users: InMemoryUserRepository, media: FakeMediaStore) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let users = Arc::new(users);
        let media = Arc::new(media);
        let state = test_state(dir.path(), users.clone(), media.clone());
        Self {
            router: build_app(state),
            users,
            media,
            dir,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<String>, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let cookies = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, cookies, json)
    }

    async fn register(&self, fields: &[(&str, &str)], files: &[(&str, &str)]) -> (StatusCode, Value) {
        let (status, _, json) = self.send(register_request(fields, files)).await;
        (status, json)
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Vec<String>, Value) {
        let payload = json!({"email": email, "password": password});
        self.send(
            Request::builder()
                .method("POST")
                .uri(api_path("/users/login"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
    }

    fn staged_files_left(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("temp"))
            .map(|d| d.count())
            .unwrap_or(0)
    }
}

fn api_path(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

/// `files` are (field name, file name); contents are a few fake bytes.
fn register_request(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"\x89PNG fake image bytes");
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(api_path("/users/register"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

const ALICE: [(&str, &str); 4] = [
    ("username", "alice"),
    ("email", "a@x.com"),
    ("fullname", "Alice A"),
    ("password", "secret1"),
];
const AVATAR: [(&str, &str); 1] = [("avatar", "me.png")];

#[tokio::test]
async fn register_creates_user_without_credentials_in_projection() {
    let app = TestApp::new();
    let (status, json) = app.register(&ALICE, &AVATAR).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["statusCode"], 201);
    assert_eq!(json["message"], "User has been registered successfully");
    let data = &json["data"];
    assert_eq!(data["username"], "alice");
    assert_eq!(data["email"], "a@x.com");
    assert_eq!(data["fullname"], "Alice A");
    assert!(data["avatar"].as_str().unwrap().starts_with("https://media.test/avatar-"));
    assert_eq!(data["coverImage"], "");
    assert!(data.get("password").is_none());
    assert!(data.get("passwordHash").is_none());
    assert!(data.get("refreshToken").is_none());

    let stored = app.users.all();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].password_hash, "secret1");
    assert!(verify_password("secret1", &stored[0].password_hash).unwrap());
    assert_eq!(app.staged_files_left(), 0);
}

#[tokio::test]
async fn register_normalizes_username_and_email() {
    let app = TestApp::new();
    let fields = [
        ("username", "  Alice "),
        ("email", "A@X.com "),
        ("fullname", " Alice A "),
        ("password", "secret1"),
    ];
    let (status, json) = app.register(&fields, &AVATAR).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["username"], "alice");
    assert_eq!(json["data"]["email"], "a@x.com");
    assert_eq!(json["data"]["fullname"], "Alice A");
}

#[tokio::test]
async fn register_stores_cover_image_when_present() {
    let app = TestApp::new();
    let files = [("avatar", "me.png"), ("coverImage", "cover.png")];
    let (status, json) = app.register(&ALICE, &files).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["data"]["coverImage"]
        .as_str()
        .unwrap()
        .starts_with("https://media.test/coverImage-"));
    assert_eq!(app.media.uploaded().len(), 2);
}

#[tokio::test]
async fn register_rejects_missing_or_blank_fields() {
    for missing in ["username", "email", "fullname", "password"] {
        let app = TestApp::new();
        let without: Vec<(&str, &str)> =
            ALICE.iter().copied().filter(|(k, _)| *k != missing).collect();
        let (status, json) = app.register(&without, &AVATAR).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {missing}");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "All fields are required");
        assert_eq!(json["errors"][0], format!("{missing} is required"));

        let blank: Vec<(&str, &str)> = ALICE
            .iter()
            .map(|(k, v)| if *k == missing { (*k, "   ") } else { (*k, *v) })
            .collect();
        let (status, _) = app.register(&blank, &AVATAR).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "blank {missing}");

        assert!(app.users.all().is_empty());
        assert!(app.media.uploaded().is_empty());
        assert_eq!(app.staged_files_left(), 0);
    }
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let app = TestApp::new();
    let fields = [
        ("username", "alice"),
        ("email", "not-an-email"),
        ("fullname", "Alice A"),
        ("password", "secret1"),
    ];
    let (status, json) = app.register(&fields, &AVATAR).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid email");
}

#[tokio::test]
async fn register_duplicate_username_or_email_conflicts() {
    let app = TestApp::new();
    let (status, _) = app.register(&ALICE, &AVATAR).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = app.register(&ALICE, &AVATAR).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);

    let same_email = [
        ("username", "alice2"),
        ("email", "a@x.com"),
        ("fullname", "Other"),
        ("password", "secret2"),
    ];
    let (status, _) = app.register(&same_email, &AVATAR).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let same_username_other_case = [
        ("username", "ALICE"),
        ("email", "b@x.com"),
        ("fullname", "Other"),
        ("password", "secret2"),
    ];
    let (status, _) = app.register(&same_username_other_case, &AVATAR).await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(app.users.all().len(), 1);
    // Conflicts are detected before anything is uploaded.
    assert_eq!(app.media.uploaded().len(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_rejected_by_store_discards_uploads() {
    let app = TestApp::with(InMemoryUserRepository::racing(), FakeMediaStore::default());
    let (status, _) = app.register(&ALICE, &AVATAR).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = app.register(&ALICE, &AVATAR).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["statusCode"], 409);
    assert_eq!(app.users.all().len(), 1);
    assert_eq!(app.media.deleted().len(), 1);
}

#[tokio::test]
async fn register_without_avatar_is_rejected() {
    let app = TestApp::new();
    let (status, json) = app.register(&ALICE, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Avatar file is required");

    let (status, _) = app.register(&ALICE, &[("coverImage", "cover.png")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.users.all().is_empty());
    assert_eq!(app.staged_files_left(), 0);
}

#[tokio::test]
async fn avatar_upload_failure_is_upload_error() {
    let app = TestApp::with(
        InMemoryUserRepository::default(),
        FakeMediaStore::failing_on("avatar"),
    );
    let files = [("avatar", "me.png"), ("coverImage", "cover.png")];
    let (status, json) = app.register(&ALICE, &files).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Avatar upload to media store failed");
    assert!(app.users.all().is_empty());
    // The cover made it to the host and is dropped again.
    assert_eq!(app.media.deleted().len(), 1);
    assert_eq!(app.staged_files_left(), 0);
}

#[tokio::test]
async fn cover_upload_failure_is_tolerated() {
    let app = TestApp::with(
        InMemoryUserRepository::default(),
        FakeMediaStore::failing_on("coverImage"),
    );
    let files = [("avatar", "me.png"), ("coverImage", "cover.png")];
    let (status, json) = app.register(&ALICE, &files).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["coverImage"], "");
    assert_eq!(app.staged_files_left(), 0);
}

#[tokio::test]
async fn failed_insert_is_internal_error_and_discards_uploads() {
    let app = TestApp::with(
        InMemoryUserRepository::failing_create(),
        FakeMediaStore::default(),
    );
    let (status, json) = app.register(&ALICE, &AVATAR).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(app.media.deleted().len(), 1);
}

#[tokio::test]
async fn unreadable_profile_after_insert_is_internal_error() {
    let app = TestApp::with(
        InMemoryUserRepository::losing_profiles(),
        FakeMediaStore::default(),
    );
    let (status, json) = app.register(&ALICE, &AVATAR).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["statusCode"], 500);
    assert_eq!(
        json["message"],
        "Something went wrong while creating user in DB"
    );
    assert!(json["data"].is_null());
}

#[tokio::test]
async fn register_requires_multipart() {
    let app = TestApp::new();
    let (status, _, json) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(api_path("/users/register"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"username": "alice"}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn login_returns_tokens_sets_cookies_and_persists_refresh_token() {
    let app = TestApp::new();
    app.register(&ALICE, &AVATAR).await;

    let (status, cookies, json) = app.login("a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Login successful");
    let data = &json["data"];
    assert_eq!(data["fullname"], "Alice A");
    let access = data["accessToken"].as_str().unwrap();
    let refresh = data["refreshToken"].as_str().unwrap();
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());

    assert!(cookies.iter().any(|c| c.starts_with(&format!("accessToken={access};"))));
    assert!(cookies.iter().any(|c| c.starts_with(&format!("refreshToken={refresh};"))));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

    let stored = &app.users.all()[0];
    assert_eq!(stored.refresh_token.as_deref(), Some(refresh));

    let tokens = TokenService::from_config(&test_config(app.dir.path()).jwt);
    let claims = tokens.verify_access(access).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.email, "a@x.com");
    assert_eq!(tokens.verify_refresh(refresh).unwrap().sub, stored.id);
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let app = TestApp::new();
    app.register(&ALICE, &AVATAR).await;
    let (status, _, _) = app.login(" A@X.COM ", "secret1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let app = TestApp::new();
    app.register(&ALICE, &AVATAR).await;

    let (status, cookies, json) = app.login("a@x.com", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["statusCode"], 401);
    assert!(cookies.is_empty());
    assert!(app.users.all()[0].refresh_token.is_none());
}

#[tokio::test]
async fn login_with_unknown_email_is_400() {
    let app = TestApp::new();
    let (status, _, json) = app.login("nobody@x.com", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "You are not a registered user");
}

#[tokio::test]
async fn login_accepts_urlencoded_body() {
    let app = TestApp::new();
    app.register(&ALICE, &AVATAR).await;
    let (status, _, json) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(api_path("/users/login"))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("email=a%40x.com&password=secret1"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["fullname"], "Alice A");
}

#[tokio::test]
async fn login_missing_fields_is_validation_error() {
    let app = TestApp::new();
    let (status, _, json) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(api_path("/users/login"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Email and password are required");
}

#[tokio::test]
async fn oversized_json_body_is_rejected_with_envelope() {
    let app = TestApp::new();
    let huge = "x".repeat(20 * 1024);
    let payload = json!({"email": "a@x.com", "password": huge});
    let (status, _, json) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(api_path("/users/login"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn malformed_json_is_enveloped() {
    let app = TestApp::new();
    let (status, _, json) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(api_path("/users/login"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["statusCode"], 400);
}

#[tokio::test]
async fn health_and_static_files() {
    let app = TestApp::new();
    let public = app.dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("hello.txt"), "hi there").unwrap();

    let res = app
        .router
        .clone()
        .oneshot(Request::builder().uri(api_path("/health")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/hello.txt").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hi there");

    let (status, _, json) = app
        .send(Request::builder().uri("/missing.txt").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

async fn preflight(router: Router, origin: &str) -> axum::http::HeaderMap {
    router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri(api_path("/users/login"))
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .headers()
        .clone()
}

#[tokio::test]
async fn cors_does_not_reflect_unlisted_origin() {
    let app = TestApp::new();
    let headers = preflight(app.router.clone(), "https://evil.example").await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn cors_wildcard_never_allows_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.http.cors_origin = "*".to_string();
    let state = AppState::from_parts(
        Arc::new(config),
        Arc::new(InMemoryUserRepository::default()),
        Arc::new(FakeMediaStore::default()),
    );

    let headers = preflight(build_app(state), "https://evil.example").await;
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
}

#[tokio::test]
async fn cors_allows_configured_origin_with_credentials() {
    let app = TestApp::new();
    let res = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri(api_path("/users/login"))
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let headers = res.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}
