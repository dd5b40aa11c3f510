use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_secret: String,
    pub refresh_ttl_minutes: i64,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Connection URL with the database name appended to the server URI.
    pub fn url(&self) -> String {
        format!("{}/{}", self.uri.trim_end_matches('/'), self.name)
    }
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub enum MediaConfig {
    Cloudinary(CloudinaryConfig),
    S3(S3Config),
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub public_dir: PathBuf,
    pub upload_temp_dir: PathBuf,
    pub body_limit_bytes: usize,
    pub upload_limit_bytes: usize,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Source(lookup);

        let http = HttpConfig {
            host: env.or("APP_HOST", "0.0.0.0"),
            port: env.parse("PORT", 8000)?,
            cors_origin: env.or("CORS_ORIGIN", "*"),
            public_dir: env.or("PUBLIC_DIR", "./public").into(),
            upload_temp_dir: env.or("UPLOAD_TEMP_DIR", "./public/temp").into(),
            body_limit_bytes: env.parse("BODY_LIMIT_BYTES", 16 * 1024)?,
            upload_limit_bytes: env.parse("UPLOAD_LIMIT_BYTES", 10 * 1024 * 1024)?,
            cookie_secure: env.parse("COOKIE_SECURE", true)?,
        };

        let database = DatabaseConfig {
            uri: env.required("DATABASE_URI")?,
            name: env.or("DB_NAME", "vidnest"),
            max_connections: env.parse("DB_MAX_CONNECTIONS", 10)?,
        };

        let jwt = JwtConfig {
            access_secret: env.required("ACCESS_TOKEN_SECRET")?,
            access_ttl_minutes: env.ttl_minutes("ACCESS_TOKEN_TTL_MINUTES", 60 * 24)?,
            refresh_secret: env.required("REFRESH_TOKEN_SECRET")?,
            refresh_ttl_minutes: env.ttl_minutes("REFRESH_TOKEN_TTL_MINUTES", 60 * 24 * 10)?,
            issuer: env.or("JWT_ISSUER", "vidnest"),
            audience: env.or("JWT_AUDIENCE", "vidnest-users"),
        };

        let media = match env.or("MEDIA_BACKEND", "cloudinary").as_str() {
            "cloudinary" => MediaConfig::Cloudinary(CloudinaryConfig {
                cloud_name: env.required("CLOUDINARY_CLOUD_NAME")?,
                api_key: env.required("CLOUDINARY_API_KEY")?,
                api_secret: env.required("CLOUDINARY_API_SECRET")?,
                api_base: env.or("CLOUDINARY_API_BASE", "https://api.cloudinary.com"),
            }),
            "s3" => {
                let endpoint = env.required("S3_ENDPOINT")?;
                let bucket = env.required("S3_BUCKET")?;
                let public_url = env
                    .get("S3_PUBLIC_URL")
                    .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
                MediaConfig::S3(S3Config {
                    endpoint,
                    bucket,
                    access_key: env.required("S3_ACCESS_KEY")?,
                    secret_key: env.required("S3_SECRET_KEY")?,
                    region: env.or("S3_REGION", "us-east-1"),
                    public_url,
                })
            }
            other => anyhow::bail!("unknown MEDIA_BACKEND {other:?} (expected cloudinary or s3)"),
        };

        Ok(Self {
            http,
            database,
            jwt,
            media,
        })
    }
}

/// Upper bound for token lifetimes: one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        self.get(key)
            .with_context(|| format!("missing required environment variable {key}"))
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
            None => Ok(default),
        }
    }

    fn ttl_minutes(&self, key: &str, default: i64) -> anyhow::Result<i64> {
        let minutes = self.parse(key, default)?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
            anyhow::bail!("{key} must be between 1 and {MAX_TOKEN_TTL_MINUTES} minutes, got {minutes}");
        }
        Ok(minutes)
    }
}
