//! Session tokens: HMAC-signed JWTs naming an employee and their role.

use crate::core::error::{CrmError, CrmResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Shortest shared secret accepted for signing.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Longest session accepted: one week.
pub const MAX_TTL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub algorithm: JwtAlgorithm,
    pub leeway_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "epicevents".into(),
            audience: "epicevents-cli".into(),
            ttl_minutes: 30,
            algorithm: JwtAlgorithm::HS256,
            leeway_seconds: 0,
        }
    }
}

impl TokenConfig {
    fn lifetime(&self) -> CrmResult<Duration> {
        if !(1..=MAX_TTL_MINUTES).contains(&self.ttl_minutes) {
            return Err(CrmError::Config(format!(
                "token ttl of {} minutes is outside 1..={MAX_TTL_MINUTES}",
                self.ttl_minutes
            )));
        }
        Duration::try_minutes(self.ttl_minutes)
            .ok_or_else(|| CrmError::Config("token ttl overflows".to_string()))
    }
}

/// Only the symmetric family is offered; a CLI has nowhere to keep a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Employee number.
    pub sub: String,
    pub role_id: i32,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(
        subject: &str,
        role_id: i32,
        config: &TokenConfig,
        issued_at: DateTime<Utc>,
    ) -> CrmResult<Self> {
        let expiry = issued_at
            .checked_add_signed(config.lifetime()?)
            .ok_or_else(|| CrmError::Config("token expiry is out of range".to_string()))?;
        Ok(Self {
            sub: subject.to_owned(),
            role_id,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            iat: issued_at.timestamp(),
            exp: expiry.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        })
    }

    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }
}

/// What a verified credential vouches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub employee_number: String,
    pub role_id: i32,
}

impl From<Claims> for VerifiedIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            employee_number: claims.sub,
            role_id: claims.role_id,
        }
    }
}

pub struct TokenService {
    config: TokenConfig,
    signer: EncodingKey,
    checker: DecodingKey,
    rules: Validation,
}

impl TokenService {
    pub fn new(config: TokenConfig, secret: &str) -> CrmResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(CrmError::Config(format!(
                "jwt_secret is {} characters long, {MIN_SECRET_LENGTH} is the minimum",
                secret.len()
            )));
        }

        config.lifetime()?;

        let mut rules = Validation::new(config.algorithm.into());
        rules.set_issuer(&[config.issuer.as_str()]);
        rules.set_audience(&[config.audience.as_str()]);
        rules.leeway = config.leeway_seconds;

        Ok(Self {
            signer: EncodingKey::from_secret(secret.as_bytes()),
            checker: DecodingKey::from_secret(secret.as_bytes()),
            rules,
            config,
        })
    }

    pub fn issue(&self, employee_number: &str, role_id: i32) -> CrmResult<String> {
        self.issue_at(employee_number, role_id, Utc::now())
    }

    /// Like [`issue`](Self::issue) with an explicit issuance instant.
    pub fn issue_at(
        &self,
        employee_number: &str,
        role_id: i32,
        issued_at: DateTime<Utc>,
    ) -> CrmResult<String> {
        let claims = Claims::new(employee_number, role_id, &self.config, issued_at)?;
        let token = jsonwebtoken::encode(&Header::new(self.config.algorithm.into()), &claims, &self.signer)
            .map_err(|e| CrmError::Config(format!("cannot sign session token: {e}")))?;
        debug!(employee = %employee_number, role_id, exp = claims.exp, "session token issued");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> CrmResult<VerifiedIdentity> {
        jsonwebtoken::decode::<Claims>(token.trim(), &self.checker, &self.rules)
            .map(|data| data.claims.into())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CrmError::ExpiredCredential,
                _ => CrmError::InvalidCredential(e.to_string()),
            })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}
