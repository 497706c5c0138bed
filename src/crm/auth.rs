use super::employees::{department_of, find_by_number};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::models::Employee;
use crate::core::shared::schema::employees;
use crate::core::shared::utils::DbConn;
use crate::security::jwt::TokenService;
use crate::security::password::SecretHasher;
use crate::security::rbac::Actor;
use crate::security::session::CredentialStore;
use diesel::prelude::*;
use tracing::{info, warn};

/// Checks the password, then saves a fresh credential for the employee.
pub fn login(
    conn: &mut DbConn,
    hasher: &SecretHasher,
    tokens: &TokenService,
    store: &dyn CredentialStore,
    employee_number: &str,
    password: &str,
) -> CrmResult<Employee> {
    let employee = match find_by_number(conn, employee_number) {
        Ok(employee) => employee,
        Err(CrmError::NotFound(_)) => {
            warn!(employee = %employee_number, "login with unknown employee number");
            return Err(CrmError::AuthenticationFailed(format!(
                "no employee with number {employee_number}"
            )));
        }
        Err(e) => return Err(e),
    };

    if !hasher.verify(password, &employee.password)? {
        warn!(employee = %employee.employee_number, "login with wrong password");
        return Err(CrmError::AuthenticationFailed("invalid password".to_string()));
    }

    let department = department_of(&employee)?;
    let credential = tokens.issue(&employee.employee_number, department.id())?;
    store.save(&credential)?;
    info!(employee = %employee.employee_number, department = %department, "logged in");
    Ok(employee)
}

pub fn change_password(
    conn: &mut DbConn,
    hasher: &SecretHasher,
    actor: &Actor,
    current: &str,
    new_password: &str,
) -> CrmResult<Employee> {
    let employee = find_by_number(conn, &actor.employee_number)?;
    if !hasher.verify(current, &employee.password)? {
        return Err(CrmError::AuthenticationFailed(
            "current password is incorrect".to_string(),
        ));
    }
    if current == new_password {
        return Err(CrmError::invalid(
            "password",
            "the new password must differ from the current one",
        ));
    }
    let hash = hasher.hash_new(new_password)?;
    let updated = diesel::update(employees::table.find(employee.id))
        .set(employees::password.eq(hash))
        .returning(Employee::as_returning())
        .get_result(conn)?;
    info!(employee = %updated.employee_number, "password changed by its owner");
    Ok(updated)
}
