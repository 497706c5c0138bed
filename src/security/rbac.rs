//! Role gates applied in front of every command.
//!
//! Authentication always runs first. Role checks only ever see a verified
//! identity, so a missing or forged credential never reveals which
//! department a command needs.

use super::jwt::{TokenService, VerifiedIdentity};
use super::session::CredentialStore;
use crate::core::error::{CrmError, CrmResult};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Department {
    Commercial = 1,
    Support = 2,
    Management = 3,
}

impl Department {
    pub const ALL: [Department; 3] = [Self::Commercial, Self::Support, Self::Management];

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Commercial),
            2 => Some(Self::Support),
            3 => Some(Self::Management),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Commercial => "Commercial",
            Self::Support => "Support",
            Self::Management => "Management",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequirement {
    Authenticated,
    SalesOrManager,
    SupportOrManager,
    ManagerOnly,
}

impl AccessRequirement {
    pub fn allowed(self) -> &'static [Department] {
        match self {
            Self::Authenticated => &Department::ALL,
            Self::SalesOrManager => &[Department::Commercial, Department::Management],
            Self::SupportOrManager => &[Department::Support, Department::Management],
            Self::ManagerOnly => &[Department::Management],
        }
    }

    pub fn permits(self, department: Department) -> bool {
        self.allowed().contains(&department)
    }

    pub fn describe(self) -> String {
        let names: Vec<&str> = self.allowed().iter().map(|d| d.label()).collect();
        names.join(" or ")
    }
}

/// Identity proven by a valid credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub employee_number: String,
    pub department: Department,
}

impl TryFrom<VerifiedIdentity> for Principal {
    type Error = CrmError;

    fn try_from(identity: VerifiedIdentity) -> Result<Self, Self::Error> {
        let department = Department::from_id(identity.role_id).ok_or_else(|| {
            CrmError::InvalidCredential(format!("unknown role {}", identity.role_id))
        })?;
        Ok(Self {
            employee_number: identity.employee_number,
            department,
        })
    }
}

/// A principal resolved to its employee row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub employee_number: String,
    pub department: Department,
}

impl Actor {
    pub fn is_manager(&self) -> bool {
        self.department == Department::Management
    }
}

pub fn require_authenticated(
    store: &dyn CredentialStore,
    tokens: &TokenService,
) -> CrmResult<Principal> {
    let credential = store.load()?.ok_or(CrmError::NotAuthenticated)?;
    let principal = Principal::try_from(tokens.verify(&credential)?)?;
    debug!(employee = %principal.employee_number, department = %principal.department, "authenticated");
    Ok(principal)
}

pub fn require_role(
    requirement: AccessRequirement,
) -> impl Fn(Principal) -> CrmResult<Principal> + Clone {
    move |principal: Principal| {
        if !requirement.permits(principal.department) {
            warn!(
                employee = %principal.employee_number,
                department = %principal.department,
                ?requirement,
                "access denied"
            );
            return Err(CrmError::Unauthorized(format!(
                "this command is reserved to the {} department",
                requirement.describe()
            )));
        }
        Ok(principal)
    }
}

pub struct AccessGuard<'a> {
    store: &'a dyn CredentialStore,
    tokens: &'a TokenService,
}

impl<'a> AccessGuard<'a> {
    pub fn new(store: &'a dyn CredentialStore, tokens: &'a TokenService) -> Self {
        Self { store, tokens }
    }

    pub fn check(&self, requirement: AccessRequirement) -> CrmResult<Principal> {
        let principal = require_authenticated(self.store, self.tokens)?;
        require_role(requirement)(principal)
    }
}

/// Resource-level gate: the assigned contact or Management. Unassigned
/// resources are Management's alone.
pub fn ensure_owner_or_manager(
    actor: &Actor,
    contact_id: Option<i32>,
    resource: &str,
) -> CrmResult<()> {
    if actor.is_manager() {
        return Ok(());
    }
    match contact_id {
        Some(id) if id == actor.id => Ok(()),
        Some(_) => Err(CrmError::Unauthorized(format!(
            "{resource} is assigned to another employee"
        ))),
        None => Err(CrmError::Unauthorized(format!(
            "{resource} has no assigned contact, only Management can modify it"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::jwt::TokenConfig;
    use crate::security::session::MemoryCredentialStore;
    use chrono::{Duration, Utc};

    fn tokens() -> TokenService {
        TokenService::new(
            TokenConfig::default(),
            "this-is-a-very-long-secret-key-for-testing-purposes-only",
        )
        .expect("Failed to create service")
    }

    fn store_for(tokens: &TokenService, number: &str, role_id: i32) -> MemoryCredentialStore {
        MemoryCredentialStore::with_credential(tokens.issue(number, role_id).expect("issue"))
    }

    fn actor(id: i32, department: Department) -> Actor {
        Actor {
            id,
            employee_number: format!("EMP{id:04}"),
            department,
        }
    }

    #[test]
    fn test_allowed_sets() {
        use Department::*;
        assert!(AccessRequirement::SalesOrManager.permits(Commercial));
        assert!(!AccessRequirement::SalesOrManager.permits(Support));
        assert!(AccessRequirement::SupportOrManager.permits(Support));
        assert!(!AccessRequirement::SupportOrManager.permits(Commercial));
        assert!(AccessRequirement::ManagerOnly.permits(Management));
        assert!(!AccessRequirement::ManagerOnly.permits(Commercial));
        for department in Department::ALL {
            assert!(AccessRequirement::Authenticated.permits(department));
            assert!(AccessRequirement::SalesOrManager.permits(Management));
        }
    }

    #[test]
    fn test_missing_credential() {
        let tokens = tokens();
        let store = MemoryCredentialStore::new();
        let guard = AccessGuard::new(&store, &tokens);
        assert!(matches!(
            guard.check(AccessRequirement::ManagerOnly),
            Err(CrmError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_expired_credential_reported_before_role() {
        let tokens = tokens();
        let stale = tokens
            .issue_at("EMP0001", 1, Utc::now() - Duration::hours(2))
            .expect("issue");
        let store = MemoryCredentialStore::with_credential(stale);
        let guard = AccessGuard::new(&store, &tokens);
        assert!(matches!(
            guard.check(AccessRequirement::ManagerOnly),
            Err(CrmError::ExpiredCredential)
        ));
    }

    #[test]
    fn test_garbage_credential() {
        let tokens = tokens();
        let store = MemoryCredentialStore::with_credential("garbage");
        let guard = AccessGuard::new(&store, &tokens);
        assert!(matches!(
            guard.check(AccessRequirement::Authenticated),
            Err(CrmError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_role_mismatch_names_department() {
        let tokens = tokens();
        let store = store_for(&tokens, "EMP0003", 2);
        let guard = AccessGuard::new(&store, &tokens);
        match guard.check(AccessRequirement::SalesOrManager) {
            Err(CrmError::Unauthorized(message)) => {
                assert!(message.contains("Commercial or Management"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn test_role_match() {
        let tokens = tokens();
        let store = store_for(&tokens, "EMP0005", 3);
        let principal = AccessGuard::new(&store, &tokens)
            .check(AccessRequirement::ManagerOnly)
            .expect("manager allowed");
        assert_eq!(principal.employee_number, "EMP0005");
        assert_eq!(principal.department, Department::Management);
    }

    #[test]
    fn test_unknown_role_in_credential() {
        let tokens = tokens();
        let store = store_for(&tokens, "EMP0009", 7);
        assert!(matches!(
            AccessGuard::new(&store, &tokens).check(AccessRequirement::Authenticated),
            Err(CrmError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_ownership() {
        let owner = actor(1, Department::Commercial);
        let other = actor(2, Department::Commercial);
        let manager = actor(5, Department::Management);

        assert!(ensure_owner_or_manager(&owner, Some(1), "customer 1").is_ok());
        assert!(ensure_owner_or_manager(&manager, Some(1), "customer 1").is_ok());
        assert!(matches!(
            ensure_owner_or_manager(&other, Some(1), "customer 1"),
            Err(CrmError::Unauthorized(_))
        ));
        assert!(ensure_owner_or_manager(&owner, None, "event 2").is_err());
        assert!(ensure_owner_or_manager(&manager, None, "event 2").is_ok());
    }
}
