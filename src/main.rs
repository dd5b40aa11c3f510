use vidnest::{app, middleware::panic_message, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "vidnest=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
    set_panic_hook();

    let app_state = match AppState::init().await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = ?e, "startup failed");
            return Err(e);
        }
    };
    let http = app_state.config.http.clone();

    app::serve(app::build_app(app_state), &http).await
}

fn set_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let message = panic_message(info.payload());
        let backtrace = std::backtrace::Backtrace::capture();
        match info.location() {
            Some(location) => {
                tracing::error!(panic = %message, location = %location, backtrace = %backtrace, "panic")
            }
            None => tracing::error!(panic = %message, backtrace = %backtrace, "panic"),
        }
    }));
}
