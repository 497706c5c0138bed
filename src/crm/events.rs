use super::contracts::{find_contract, has_event};
use super::customers::assignable_employee;
use super::fields::{EVENT, LOCATION_MAX, NAME_MAX, NOTES_MAX};
use super::query::QueryPlan;
use super::rules::{
    coerce, ensure_chronology, optional, parse_attendees, parse_name, parse_timestamp, FieldValue,
};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::models::{Contract, Event, EventChanges, NewEvent};
use crate::core::shared::schema::events;
use crate::core::shared::utils::{now, DbConn};
use crate::security::rbac::{ensure_owner_or_manager, Actor, Department};
use crate::security::validation::validate_length;
use diesel::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub contract_id: i32,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub location: Option<String>,
    pub attendees: Option<String>,
    pub notes: Option<String>,
}

pub fn find_event(conn: &mut DbConn, id: i32) -> CrmResult<Event> {
    events::table
        .find(id)
        .select(Event::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::NotFound(format!("event {id}")))
}

/// A contract takes an event only once, only when signed, and only from its
/// sales contact or Management.
pub fn check_event_eligibility(
    conn: &mut DbConn,
    actor: &Actor,
    contract_id: i32,
) -> CrmResult<Contract> {
    let contract = find_contract(conn, contract_id)?;
    if has_event(conn, contract_id)? {
        return Err(CrmError::invalid(
            "contract_id",
            format!("contract {contract_id} already has an event"),
        ));
    }
    ensure_owner_or_manager(
        actor,
        contract.sale_contact_id,
        &format!("contract {contract_id}"),
    )?;
    if !contract.signed {
        return Err(CrmError::invalid(
            "contract_id",
            format!("contract {contract_id} is not signed"),
        ));
    }
    Ok(contract)
}

fn optional_text(raw: Option<&str>, field: &str, max: usize) -> CrmResult<Option<String>> {
    match optional(raw) {
        Some(value) => {
            validate_length(value, field, max)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

pub fn create_event(conn: &mut DbConn, actor: &Actor, draft: &EventDraft) -> CrmResult<Event> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let contract = check_event_eligibility(conn, actor, draft.contract_id)?;

        let name = parse_name(&draft.name, "name", NAME_MAX)?;
        let start = parse_timestamp(&draft.start_date, "start_date")?;
        let end = parse_timestamp(&draft.end_date, "end_date")?;
        ensure_chronology(Some(start), Some(end))?;
        let attendees = optional(draft.attendees.as_deref())
            .map(parse_attendees)
            .transpose()?;

        let event = diesel::insert_into(events::table)
            .values(&NewEvent {
                name,
                contract_id: contract.id,
                support_contact_id: None,
                start_date: Some(start),
                end_date: Some(end),
                location: optional_text(draft.location.as_deref(), "location", LOCATION_MAX)?,
                attendees,
                notes: optional_text(draft.notes.as_deref(), "notes", NOTES_MAX)?,
                created_at: now(),
            })
            .returning(Event::as_returning())
            .get_result(conn)?;
        info!(event = event.id, contract = contract.id, actor = %actor.employee_number, "event created");
        Ok(event)
    })
}

pub fn list_events(conn: &mut DbConn, plan: &QueryPlan) -> CrmResult<Vec<Event>> {
    let mut query = events::table.select(Event::as_select()).into_boxed();
    for predicate in plan.predicates::<events::table>() {
        query = query.filter(predicate);
    }
    for ordering in plan.orderings() {
        query = query.then_order_by(ordering);
    }
    Ok(query.then_order_by(events::id.asc()).load(conn)?)
}

/// Dates are checked on the merged result, so moving both ends at once works.
pub fn event_changes(event: &Event, updates: &[(String, String)]) -> CrmResult<EventChanges> {
    if updates.is_empty() {
        return Err(CrmError::invalid("update", "nothing to update"));
    }
    let mut changes = EventChanges::default();
    for (attribute, raw) in updates {
        let field = EVENT.updatable(attribute)?;
        match (field.name, coerce(field, raw)?) {
            ("name", FieldValue::Text(v)) => changes.name = Some(v),
            ("start_date", FieldValue::Timestamp(v)) => changes.start_date = Some(v),
            ("end_date", FieldValue::Timestamp(v)) => changes.end_date = Some(v),
            ("location", FieldValue::Text(v)) => changes.location = Some(Some(v)),
            ("location", FieldValue::Cleared) => changes.location = Some(None),
            ("attendees", FieldValue::Integer(v)) => changes.attendees = Some(v),
            ("notes", FieldValue::Text(v)) => changes.notes = Some(Some(v)),
            ("notes", FieldValue::Cleared) => changes.notes = Some(None),
            _ => return Err(CrmError::ImmutableAttribute(attribute.clone())),
        }
    }
    ensure_chronology(
        changes.start_date.or(event.start_date),
        changes.end_date.or(event.end_date),
    )?;
    Ok(changes)
}

pub fn update_event(
    conn: &mut DbConn,
    actor: &Actor,
    id: i32,
    updates: &[(String, String)],
) -> CrmResult<Event> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let event = find_event(conn, id)?;
        ensure_owner_or_manager(actor, event.support_contact_id, &format!("event {id}"))?;
        let changes = event_changes(&event, updates)?;
        let updated = diesel::update(events::table.find(id))
            .set(&changes)
            .returning(Event::as_returning())
            .get_result(conn)?;
        info!(event = id, actor = %actor.employee_number, "event updated");
        Ok(updated)
    })
}

pub fn update_event_support_contact(
    conn: &mut DbConn,
    event_id: i32,
    employee_key: &str,
) -> CrmResult<Event> {
    conn.transaction::<_, CrmError, _>(|conn| {
        find_event(conn, event_id)?;
        let contact = assignable_employee(conn, employee_key, Department::Support)?;
        let event = diesel::update(events::table.find(event_id))
            .set(events::support_contact_id.eq(Some(contact.id)))
            .returning(Event::as_returning())
            .get_result(conn)?;
        info!(event = event_id, support_contact = %contact.employee_number, "event reassigned");
        Ok(event)
    })
}

pub fn delete_event(conn: &mut DbConn, id: i32) -> CrmResult<Event> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let event = find_event(conn, id)?;
        diesel::delete(events::table.find(id)).execute(conn)?;
        info!(event = id, "event deleted");
        Ok(event)
    })
}
