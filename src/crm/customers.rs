use super::employees::{department_of, find_employee};
use super::fields::{COMPANY_MAX, CUSTOMER, NAME_MAX};
use super::query::QueryPlan;
use super::rules::{coerce, optional, parse_email, parse_name, parse_phone, FieldValue};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::models::{Customer, CustomerChanges, Employee, NewCustomer};
use crate::core::shared::schema::{contracts, customers};
use crate::core::shared::utils::{now, DbConn};
use crate::security::rbac::{ensure_owner_or_manager, Actor, Department};
use crate::security::validation::validate_length;
use diesel::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CustomerDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

pub fn find_customer(conn: &mut DbConn, id: i32) -> CrmResult<Customer> {
    customers::table
        .find(id)
        .select(Customer::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::NotFound(format!("customer {id}")))
}

fn ensure_email_free(conn: &mut DbConn, email: &str, except: Option<i32>) -> CrmResult<()> {
    let mut query = customers::table
        .filter(customers::email.eq(email))
        .select(customers::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(customers::id.ne(id));
    }
    if query.first::<i32>(conn).optional()?.is_some() {
        return Err(CrmError::ConstraintViolation(format!(
            "email {email} is already used by another customer"
        )));
    }
    Ok(())
}

/// The acting employee becomes the customer's sales contact.
pub fn create_customer(
    conn: &mut DbConn,
    actor: &Actor,
    draft: &CustomerDraft,
) -> CrmResult<Customer> {
    let first_name = parse_name(&draft.first_name, "first_name", NAME_MAX)?;
    let last_name = parse_name(&draft.last_name, "last_name", NAME_MAX)?;
    let email = parse_email(&draft.email)?;
    let phone = optional(draft.phone.as_deref()).map(parse_phone).transpose()?;
    let company = optional(draft.company.as_deref())
        .map(|c| validate_length(c, "company", COMPANY_MAX).map(|_| c.to_string()))
        .transpose()?;

    conn.transaction::<_, CrmError, _>(|conn| {
        ensure_email_free(conn, &email, None)?;
        let stamp = now();
        let customer = diesel::insert_into(customers::table)
            .values(&NewCustomer {
                first_name,
                last_name,
                email,
                phone,
                company,
                sale_contact_id: Some(actor.id),
                created_at: stamp,
                updated_at: stamp,
            })
            .returning(Customer::as_returning())
            .get_result(conn)?;
        info!(customer = customer.id, sale_contact = %actor.employee_number, "customer created");
        Ok(customer)
    })
}

pub fn list_customers(conn: &mut DbConn, plan: &QueryPlan) -> CrmResult<Vec<Customer>> {
    let mut query = customers::table.select(Customer::as_select()).into_boxed();
    for predicate in plan.predicates::<customers::table>() {
        query = query.filter(predicate);
    }
    for ordering in plan.orderings() {
        query = query.then_order_by(ordering);
    }
    Ok(query.then_order_by(customers::id.asc()).load(conn)?)
}

pub fn customer_changes(updates: &[(String, String)]) -> CrmResult<CustomerChanges> {
    if updates.is_empty() {
        return Err(CrmError::invalid("update", "nothing to update"));
    }
    let mut changes = CustomerChanges::default();
    for (attribute, raw) in updates {
        let field = CUSTOMER.updatable(attribute)?;
        match (field.name, coerce(field, raw)?) {
            ("first_name", FieldValue::Text(v)) => changes.first_name = Some(v),
            ("last_name", FieldValue::Text(v)) => changes.last_name = Some(v),
            ("email", FieldValue::Text(v)) => changes.email = Some(v),
            ("phone", FieldValue::Text(v)) => changes.phone = Some(v),
            ("company", FieldValue::Text(v)) => changes.company = Some(Some(v)),
            ("company", FieldValue::Cleared) => changes.company = Some(None),
            _ => return Err(CrmError::ImmutableAttribute(attribute.clone())),
        }
    }
    changes.updated_at = Some(now());
    Ok(changes)
}

pub fn update_customer(
    conn: &mut DbConn,
    actor: &Actor,
    id: i32,
    updates: &[(String, String)],
) -> CrmResult<Customer> {
    let changes = customer_changes(updates)?;
    conn.transaction::<_, CrmError, _>(|conn| {
        let customer = find_customer(conn, id)?;
        ensure_owner_or_manager(actor, customer.sale_contact_id, &format!("customer {id}"))?;
        if let Some(email) = &changes.email {
            ensure_email_free(conn, email, Some(id))?;
        }
        let updated = diesel::update(customers::table.find(id))
            .set(&changes)
            .returning(Customer::as_returning())
            .get_result(conn)?;
        info!(customer = id, actor = %actor.employee_number, "customer updated");
        Ok(updated)
    })
}

/// Resolves the target of a reassignment and checks it holds `required`.
pub(crate) fn assignable_employee(
    conn: &mut DbConn,
    key: &str,
    required: Department,
) -> CrmResult<Employee> {
    let employee = find_employee(conn, key).map_err(|e| match e {
        CrmError::NotFound(what) => CrmError::InvalidAssignment(format!("{what} does not exist")),
        other => other,
    })?;
    let department = department_of(&employee)?;
    if department != required {
        return Err(CrmError::InvalidAssignment(format!(
            "{} belongs to {}, a {} employee is required",
            employee.employee_number, department, required
        )));
    }
    Ok(employee)
}

/// Reassigns the sales contact and carries it over to every contract of the
/// customer. Returns the customer and the number of contracts touched.
pub fn update_customer_sale_contact(
    conn: &mut DbConn,
    customer_id: i32,
    employee_key: &str,
) -> CrmResult<(Customer, usize)> {
    conn.transaction::<_, CrmError, _>(|conn| {
        find_customer(conn, customer_id)?;
        let contact = assignable_employee(conn, employee_key, Department::Commercial)?;

        let customer = diesel::update(customers::table.find(customer_id))
            .set((
                customers::sale_contact_id.eq(Some(contact.id)),
                customers::updated_at.eq(now()),
            ))
            .returning(Customer::as_returning())
            .get_result(conn)?;
        let contracts_updated =
            diesel::update(contracts::table.filter(contracts::customer_id.eq(customer_id)))
                .set(contracts::sale_contact_id.eq(Some(contact.id)))
                .execute(conn)?;

        info!(
            customer = customer_id,
            sale_contact = %contact.employee_number,
            contracts_updated,
            "customer reassigned"
        );
        Ok((customer, contracts_updated))
    })
}

/// Contracts of the customer, and their events, go with it.
pub fn delete_customer(conn: &mut DbConn, id: i32) -> CrmResult<Customer> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let customer = find_customer(conn, id)?;
        diesel::delete(customers::table.find(id)).execute(conn)?;
        info!(customer = id, "customer deleted");
        Ok(customer)
    })
}
