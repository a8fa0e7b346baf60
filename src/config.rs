/*
 * Responsibility
 * - 環境変数や設定の読み込み (署名シークレット、トークン設定、ポリシー/レート制限の閾値)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - シークレットをソースに埋め込まない: AUTH_SIGNING_SECRET (base64) 必須、デフォルト無し
 */
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::AuthError;
use crate::services::credential::PasswordPolicy;
use crate::services::rate_limit::RateLimitConfig;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub signing_secret: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_seconds: u64,
    pub access_token_leeway_seconds: u64,
    pub bcrypt_cost: u32,
    pub password_policy: PasswordPolicy,
    pub rate_limit: RateLimitConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the secret
        f.debug_struct("Config")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field(
                "access_token_leeway_seconds",
                &self.access_token_leeway_seconds,
            )
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("password_policy", &self.password_policy)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let signing_secret = std::env::var("AUTH_SIGNING_SECRET")
            .map_err(|_| ConfigError::Missing("AUTH_SIGNING_SECRET"))?;
        let signing_secret = BASE64
            .decode(signing_secret.trim())
            .map_err(|_| ConfigError::Invalid("AUTH_SIGNING_SECRET"))?;
        if signing_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid("AUTH_SIGNING_SECRET"));
        }

        let issuer =
            std::env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;
        let audience =
            std::env::var("AUTH_AUDIENCE").map_err(|_| ConfigError::Missing("AUTH_AUDIENCE"))?;

        let access_token_ttl_seconds = std::env::var("ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600); // 10 min

        let access_token_leeway_seconds = std::env::var("ACCESS_TOKEN_LEEWAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let bcrypt_cost = std::env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(bcrypt::DEFAULT_COST);
        if !(4..=16).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid("BCRYPT_COST"));
        }

        let mut password_policy = PasswordPolicy::default();
        if let Some(min_length) = std::env::var("PASSWORD_MIN_LENGTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            password_policy.min_length = min_length;
        }

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_attempts: std::env::var("AUTH_MAX_FAILED_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_attempts),
            window_seconds: std::env::var("AUTH_FAILURE_WINDOW_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.window_seconds),
            lockout_seconds: std::env::var("AUTH_LOCKOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.lockout_seconds),
        };
        if rate_limit.max_attempts == 0 {
            return Err(ConfigError::Invalid("AUTH_MAX_FAILED_ATTEMPTS"));
        }

        Ok(Self {
            signing_secret,
            issuer,
            audience,
            access_token_ttl_seconds,
            access_token_leeway_seconds,
            bcrypt_cost,
            password_policy,
            rate_limit,
        })
    }
}

impl From<ConfigError> for AuthError {
    fn from(_: ConfigError) -> Self {
        AuthError::Internal
    }
}
