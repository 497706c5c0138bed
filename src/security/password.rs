use crate::core::error::{CrmError, CrmResult};
use argon2::password_hash::{
    rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier,
    SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

/// Length bounds, counted in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordIssue {
    #[error("password is blank")]
    Blank,
    #[error("password has {len} characters, {min} is the minimum")]
    TooShort { min: usize, len: usize },
    #[error("password has {len} characters, {max} is the maximum")]
    TooLong { max: usize, len: usize },
}

impl PasswordPolicy {
    pub fn check(&self, candidate: &str) -> Result<(), PasswordIssue> {
        if candidate.trim().is_empty() {
            return Err(PasswordIssue::Blank);
        }
        let len = candidate.chars().count();
        match len {
            n if n < self.min_length => Err(PasswordIssue::TooShort {
                min: self.min_length,
                len,
            }),
            n if n > self.max_length => Err(PasswordIssue::TooLong {
                max: self.max_length,
                len,
            }),
            _ => Ok(()),
        }
    }
}

/// Argon2id cost settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            lanes: 1,
        }
    }
}

impl Argon2Config {
    /// For fixtures. A PHC string records its own cost, so these hashes still
    /// verify under the default settings.
    pub fn low_cost() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            lanes: 1,
        }
    }

    fn params(&self) -> CrmResult<Params> {
        Params::new(self.memory_kib, self.iterations, self.lanes, None)
            .map_err(|e| CrmError::Config(format!("argon2 cost settings rejected: {e}")))
    }
}

/// One-way hashing of employee passwords at rest.
pub struct SecretHasher {
    engine: Argon2<'static>,
    policy: PasswordPolicy,
}

impl SecretHasher {
    pub fn new(cost: Argon2Config, policy: PasswordPolicy) -> CrmResult<Self> {
        Ok(Self {
            engine: Argon2::new(Algorithm::Argon2id, Version::V0x13, cost.params()?),
            policy,
        })
    }

    pub fn with_defaults() -> CrmResult<Self> {
        Self::new(Argon2Config::default(), PasswordPolicy::default())
    }

    pub fn hash(&self, plain: &str) -> CrmResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.engine
            .hash_password(plain.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| CrmError::Database(format!("hashing failed: {e}")))
    }

    /// `Ok(false)` on a mismatch. A stored value that is not a PHC string is a
    /// store fault.
    pub fn verify(&self, plain: &str, stored: &str) -> CrmResult<bool> {
        let phc = PasswordHash::new(stored)
            .map_err(|e| CrmError::Database(format!("stored password hash unreadable: {e}")))?;
        match self.engine.verify_password(plain.as_bytes(), &phc) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(e) => Err(CrmError::Database(format!("hash verification failed: {e}"))),
        }
    }

    pub fn check_policy(&self, plain: &str) -> Result<(), PasswordIssue> {
        self.policy.check(plain)
    }

    /// Hash for a password about to be stored; the policy applies first.
    pub fn hash_new(&self, plain: &str) -> CrmResult<String> {
        self.check_policy(plain)
            .map_err(|issue| CrmError::invalid("password", issue.to_string()))?;
        self.hash(plain)
    }
}
