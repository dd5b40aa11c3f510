use std::sync::Arc;

use crate::{
    config::AppConfig,
    db,
    storage::{self, MediaStore},
    users::{PgUserRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    /// Loads configuration, connects to the database (running migrations) and the media store.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database).await?;
        db::migrate(&pool).await;

        let users = Arc::new(PgUserRepository::new(pool)) as Arc<dyn UserRepository>;
        let media = storage::from_config(&config.media).await?;

        Ok(Self {
            config,
            users,
            media,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepository>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            config,
            users,
            media,
        }
    }
}
