use crate::core::error::{CrmError, CrmResult};
use crate::security::jwt::{JwtAlgorithm, TokenConfig, MAX_TTL_MINUTES};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_PATH_VAR: &str = "EPICEVENTS_CONFIG";
pub const ENV_PREFIX: &str = "EPICEVENTS_";
const DEFAULT_CONFIG_FILE: &str = "epicevents.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: Option<String>,
    pub jwt_algorithm: JwtAlgorithm,
    pub token_ttl_minutes: i64,
    pub token_leeway_seconds: u64,
    pub session_file: PathBuf,
    pub error_log: Option<PathBuf>,
    pub strict_exit_codes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "epicevents.db".to_string(),
            jwt_secret: None,
            jwt_algorithm: JwtAlgorithm::HS256,
            token_ttl_minutes: 30,
            token_leeway_seconds: 0,
            session_file: PathBuf::from(".session_token"),
            error_log: None,
            strict_exit_codes: false,
        }
    }
}

impl AppConfig {
    /// Defaults, then `epicevents.toml` (or `$EPICEVENTS_CONFIG`), then
    /// `EPICEVENTS_*` variables. A `.env` file is read into the environment first.
    pub fn load() -> CrmResult<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    pub fn from_figment(figment: Figment) -> CrmResult<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| CrmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CrmResult<()> {
        if !(1..=MAX_TTL_MINUTES).contains(&self.token_ttl_minutes) {
            return Err(CrmError::Config(format!(
                "token_ttl_minutes must be between 1 and {MAX_TTL_MINUTES}, got {}",
                self.token_ttl_minutes
            )));
        }
        Ok(())
    }

    pub fn jwt_secret(&self) -> CrmResult<&str> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CrmError::Config(format!("{ENV_PREFIX}JWT_SECRET is not set"))
            })
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            ttl_minutes: self.token_ttl_minutes,
            algorithm: self.jwt_algorithm,
            leeway_seconds: self.token_leeway_seconds,
            ..TokenConfig::default()
        }
    }
}
