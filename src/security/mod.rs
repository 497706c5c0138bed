pub mod jwt;
pub mod password;
pub mod rbac;
pub mod session;
pub mod validation;

pub use jwt::{Claims, JwtAlgorithm, TokenConfig, TokenService, VerifiedIdentity};
pub use password::{Argon2Config, PasswordIssue, PasswordPolicy, SecretHasher};
pub use rbac::{AccessGuard, AccessRequirement, Actor, Department, Principal};
pub use session::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
