use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{AccessClaims, RefreshClaims, TokenKind};
use crate::{config::JwtConfig, state::AppState, users::repo_types::User};

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl_minutes: i64) -> Self {
        let secs = u64::try_from(ttl_minutes)
            .unwrap_or(0)
            .saturating_mul(60);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(secs),
        }
    }
}

/// Issues and verifies access/refresh tokens. Each kind has its own secret and lifetime.
#[derive(Clone)]
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: String,
    audience: String,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl TokenService {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: SigningKeys::new(&cfg.access_secret, cfg.access_ttl_minutes),
            refresh: SigningKeys::new(&cfg.refresh_secret, cfg.refresh_ttl_minutes),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access.ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    /// (issued-at, expires-at) as unix seconds.
    fn window(ttl: Duration) -> anyhow::Result<(usize, usize)> {
        if ttl.is_zero() {
            anyhow::bail!("token lifetime must be positive");
        }
        let now = OffsetDateTime::now_utc();
        let exp = TimeDuration::try_from(ttl)
            .ok()
            .and_then(|d| now.checked_add(d))
            .with_context(|| format!("token lifetime of {}s is out of range", ttl.as_secs()))?;
        let iat = usize::try_from(now.unix_timestamp())?;
        let exp = usize::try_from(exp.unix_timestamp())?;
        Ok((iat, exp))
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let (iat, exp) = Self::window(self.access.ttl)?;
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &claims, &self.access.encoding)?;
        debug!(user_id = %user.id, kind = ?TokenKind::Access, "jwt signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (iat, exp) = Self::window(self.refresh.ttl)?;
        let claims = RefreshClaims {
            sub: user_id,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Refresh,
        };
        let token = encode(&Header::default(), &claims, &self.refresh.encoding)?;
        debug!(user_id = %user_id, kind = ?TokenKind::Refresh, "jwt signed");
        Ok(token)
    }

    fn decode_with<C: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> anyhow::Result<C> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        Ok(decode::<C>(token, key, &validation)?.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<AccessClaims> {
        let claims: AccessClaims = self.decode_with(token, &self.access.decoding)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        debug!(user_id = %claims.sub, "access jwt verified");
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<RefreshClaims> {
        let claims: RefreshClaims = self.decode_with(token, &self.refresh.decoding)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        debug!(user_id = %claims.sub, "refresh jwt verified");
        Ok(claims)
    }
}
