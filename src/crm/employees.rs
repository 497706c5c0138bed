use super::fields::{EMPLOYEE, NAME_MAX};
use super::query::QueryPlan;
use super::rules::{coerce, parse_email, parse_name, parse_role, FieldValue};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::models::{Employee, EmployeeChanges, NewEmployee};
use crate::core::shared::schema::employees;
use crate::core::shared::utils::{now, DbConn};
use crate::security::password::SecretHasher;
use crate::security::rbac::Department;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct EmployeeDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role_id: String,
}

/// `EMP` followed by the id zero-padded to four digits.
pub fn employee_number_for(id: i32) -> String {
    format!("EMP{id:04}")
}

pub fn find_by_number(conn: &mut DbConn, number: &str) -> CrmResult<Employee> {
    employees::table
        .filter(employees::employee_number.eq(number.trim().to_uppercase()))
        .select(Employee::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::NotFound(format!("employee {number}")))
}

/// Accepts either a numeric id or an employee number.
pub fn find_employee(conn: &mut DbConn, key: &str) -> CrmResult<Employee> {
    match key.trim().parse::<i32>() {
        Ok(id) => employees::table
            .find(id)
            .select(Employee::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| CrmError::NotFound(format!("employee {id}"))),
        Err(_) => find_by_number(conn, key),
    }
}

pub fn department_of(employee: &Employee) -> CrmResult<Department> {
    Department::from_id(employee.role_id).ok_or_else(|| {
        CrmError::Database(format!(
            "employee {} has unknown role {}",
            employee.employee_number, employee.role_id
        ))
    })
}

fn ensure_email_free(conn: &mut DbConn, email: &str, except: Option<i32>) -> CrmResult<()> {
    let mut query = employees::table
        .filter(employees::email.eq(email))
        .select(employees::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(employees::id.ne(id));
    }
    if query.first::<i32>(conn).optional()?.is_some() {
        return Err(CrmError::ConstraintViolation(format!(
            "email {email} is already used by another employee"
        )));
    }
    Ok(())
}

pub fn create_employee(
    conn: &mut DbConn,
    hasher: &SecretHasher,
    draft: &EmployeeDraft,
) -> CrmResult<Employee> {
    let first_name = parse_name(&draft.first_name, "first_name", NAME_MAX)?;
    let last_name = parse_name(&draft.last_name, "last_name", NAME_MAX)?;
    let email = parse_email(&draft.email)?;
    let role = parse_role(&draft.role_id)?;
    let password = hasher.hash_new(&draft.password)?;

    conn.transaction::<_, CrmError, _>(|conn| {
        ensure_email_free(conn, &email, None)?;
        let created: Employee = diesel::insert_into(employees::table)
            .values(&NewEmployee {
                employee_number: format!("PENDING-{}", Uuid::new_v4()),
                first_name,
                last_name,
                email,
                password,
                role_id: role.id(),
                created_at: now(),
            })
            .returning(Employee::as_returning())
            .get_result(conn)?;

        let employee = diesel::update(employees::table.find(created.id))
            .set(employees::employee_number.eq(employee_number_for(created.id)))
            .returning(Employee::as_returning())
            .get_result(conn)?;

        info!(employee = %employee.employee_number, role = %role, "employee created");
        Ok(employee)
    })
}

pub fn list_employees(conn: &mut DbConn, plan: &QueryPlan) -> CrmResult<Vec<Employee>> {
    let mut query = employees::table.select(Employee::as_select()).into_boxed();
    for predicate in plan.predicates::<employees::table>() {
        query = query.filter(predicate);
    }
    for ordering in plan.orderings() {
        query = query.then_order_by(ordering);
    }
    Ok(query.then_order_by(employees::id.asc()).load(conn)?)
}

pub fn employee_changes(updates: &[(String, String)]) -> CrmResult<EmployeeChanges> {
    if updates.is_empty() {
        return Err(CrmError::invalid("update", "nothing to update"));
    }
    let mut changes = EmployeeChanges::default();
    for (attribute, raw) in updates {
        let field = EMPLOYEE.updatable(attribute)?;
        match (field.name, coerce(field, raw)?) {
            ("first_name", FieldValue::Text(v)) => changes.first_name = Some(v),
            ("last_name", FieldValue::Text(v)) => changes.last_name = Some(v),
            ("email", FieldValue::Text(v)) => changes.email = Some(v),
            ("role_id", FieldValue::Integer(v)) => changes.role_id = Some(v),
            _ => return Err(CrmError::ImmutableAttribute(attribute.clone())),
        }
    }
    Ok(changes)
}

pub fn update_employee(
    conn: &mut DbConn,
    key: &str,
    updates: &[(String, String)],
) -> CrmResult<Employee> {
    let changes = employee_changes(updates)?;
    conn.transaction::<_, CrmError, _>(|conn| {
        let employee = find_employee(conn, key)?;
        if let Some(email) = &changes.email {
            ensure_email_free(conn, email, Some(employee.id))?;
        }
        let updated = diesel::update(employees::table.find(employee.id))
            .set(&changes)
            .returning(Employee::as_returning())
            .get_result(conn)?;
        info!(employee = %updated.employee_number, "employee updated");
        Ok(updated)
    })
}

pub fn set_password(
    conn: &mut DbConn,
    hasher: &SecretHasher,
    key: &str,
    new_password: &str,
) -> CrmResult<Employee> {
    let hash = hasher.hash_new(new_password)?;
    let employee = find_employee(conn, key)?;
    let updated = diesel::update(employees::table.find(employee.id))
        .set(employees::password.eq(hash))
        .returning(Employee::as_returning())
        .get_result(conn)?;
    info!(employee = %updated.employee_number, "password changed");
    Ok(updated)
}

/// Customers, contracts and events the employee owned lose their contact.
pub fn delete_employee(conn: &mut DbConn, key: &str) -> CrmResult<Employee> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let employee = find_employee(conn, key)?;
        diesel::delete(employees::table.find(employee.id)).execute(conn)?;
        info!(employee = %employee.employee_number, "employee deleted");
        Ok(employee)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::{seeded_connection, test_hasher};
    use crate::crm::query::{build_plan, SortDirection};

    fn draft(email: &str) -> EmployeeDraft {
        EmployeeDraft {
            first_name: "Gustave".into(),
            last_name: "Eiffel".into(),
            email: email.into(),
            password: "tour-de-fer".into(),
            role_id: "2".into(),
        }
    }

    #[test]
    fn test_employee_number_format() {
        assert_eq!(employee_number_for(7), "EMP0007");
        assert_eq!(employee_number_for(12345), "EMP12345");
    }

    #[test]
    fn test_create_assigns_number_from_id() {
        let mut conn = seeded_connection();
        let employee = create_employee(&mut conn, &test_hasher(), &draft("gustave@epicevents.com"))
            .expect("created");

        assert_eq!(employee.id, 7);
        assert_eq!(employee.employee_number, "EMP0007");
        assert_eq!(employee.role_id, 2);
        assert_ne!(employee.password, "tour-de-fer");
    }

    #[test]
    fn test_create_rejects_duplicate_email() {
        let mut conn = seeded_connection();
        let result = create_employee(
            &mut conn,
            &test_hasher(),
            &draft("alice.dupont@epicevents.com"),
        );
        assert!(matches!(result, Err(CrmError::ConstraintViolation(_))));
    }

    #[test]
    fn test_create_rejects_bad_role() {
        let mut conn = seeded_connection();
        let mut bad = draft("new@epicevents.com");
        bad.role_id = "9".into();
        assert!(matches!(
            create_employee(&mut conn, &test_hasher(), &bad),
            Err(CrmError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_find_by_id_or_number() {
        let mut conn = seeded_connection();
        assert_eq!(find_employee(&mut conn, "3").expect("by id").first_name, "Bob");
        assert_eq!(
            find_employee(&mut conn, "emp0003").expect("by number").id,
            3
        );
        assert!(matches!(
            find_employee(&mut conn, "EMP0099"),
            Err(CrmError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_sorted_by_last_name() {
        let mut conn = seeded_connection();
        let plan = build_plan(&EMPLOYEE, &[], &[("last_name".into(), SortDirection::Asc)])
            .expect("plan");
        let names: Vec<_> = list_employees(&mut conn, &plan)
            .expect("list")
            .into_iter()
            .map(|e| e.last_name)
            .collect();
        assert_eq!(
            names,
            vec!["Curie", "Dupont", "Durand", "Guerin", "Hulot", "Martin"]
        );
    }

    #[test]
    fn test_update_allow_list() {
        let mut conn = seeded_connection();
        let updated = update_employee(
            &mut conn,
            "EMP0001",
            &[("last_name".into(), "Dupond".into()), ("role_id".into(), "3".into())],
        )
        .expect("updated");
        assert_eq!(updated.last_name, "Dupond");
        assert_eq!(updated.role_id, 3);

        assert!(matches!(
            update_employee(&mut conn, "EMP0001", &[("employee_number".into(), "X".into())]),
            Err(CrmError::ImmutableAttribute(_))
        ));
        assert!(matches!(
            update_employee(&mut conn, "EMP0001", &[("password".into(), "x".into())]),
            Err(CrmError::ImmutableAttribute(_))
        ));
        assert!(matches!(
            update_employee(&mut conn, "EMP0001", &[("age".into(), "30".into())]),
            Err(CrmError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_update_email_must_stay_unique() {
        let mut conn = seeded_connection();
        let result = update_employee(
            &mut conn,
            "EMP0001",
            &[("email".into(), "bob.martin@epicevents.com".into())],
        );
        assert!(matches!(result, Err(CrmError::ConstraintViolation(_))));
    }

    #[test]
    fn test_set_password() {
        let mut conn = seeded_connection();
        let hasher = test_hasher();
        let updated = set_password(&mut conn, &hasher, "EMP0002", "nouveau-secret").expect("set");
        assert!(hasher.verify("nouveau-secret", &updated.password).expect("verify"));
    }
}
