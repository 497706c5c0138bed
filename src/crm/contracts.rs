use super::customers::find_customer;
use super::fields::CONTRACT;
use super::query::QueryPlan;
use super::rules::{coerce, optional, parse_amount, parse_yes_no, FieldValue};
use crate::core::error::{CrmError, CrmResult};
use crate::core::shared::models::{Amount, Contract, ContractChanges, NewContract};
use crate::core::shared::schema::{contracts, events};
use crate::core::shared::utils::{now, DbConn};
use crate::security::rbac::{ensure_owner_or_manager, Actor};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ContractDraft {
    pub customer_id: i32,
    pub total_amount: String,
    /// Defaults to the total.
    pub remaining_amount: Option<String>,
    pub signed: Option<String>,
}

pub fn find_contract(conn: &mut DbConn, id: i32) -> CrmResult<Contract> {
    contracts::table
        .find(id)
        .select(Contract::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| CrmError::NotFound(format!("contract {id}")))
}

pub fn has_event(conn: &mut DbConn, contract_id: i32) -> CrmResult<bool> {
    Ok(events::table
        .filter(events::contract_id.eq(contract_id))
        .select(events::id)
        .first::<i32>(conn)
        .optional()?
        .is_some())
}

fn ensure_positive(amount: &Amount, field: &str) -> CrmResult<()> {
    if amount.value() <= &BigDecimal::from(0) {
        return Err(CrmError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

fn ensure_within_total(remaining: &Amount, total: &Amount) -> CrmResult<()> {
    if remaining > total {
        return Err(CrmError::invalid(
            "remaining_amount",
            format!("{remaining} exceeds the total amount {total}"),
        ));
    }
    Ok(())
}

/// The sales contact is inherited from the customer.
pub fn create_contract(conn: &mut DbConn, draft: &ContractDraft) -> CrmResult<Contract> {
    let total = parse_amount(&draft.total_amount, "total_amount")?;
    ensure_positive(&total, "total_amount")?;
    let remaining = match optional(draft.remaining_amount.as_deref()) {
        Some(raw) => parse_amount(raw, "remaining_amount")?,
        None => total.clone(),
    };
    ensure_positive(&remaining, "remaining_amount")?;
    ensure_within_total(&remaining, &total)?;
    let signed = match optional(draft.signed.as_deref()) {
        Some(raw) => parse_yes_no(raw, "signed")?,
        None => false,
    };

    conn.transaction::<_, CrmError, _>(|conn| {
        let customer = find_customer(conn, draft.customer_id)?;
        let contract = diesel::insert_into(contracts::table)
            .values(&NewContract {
                customer_id: customer.id,
                sale_contact_id: customer.sale_contact_id,
                total_amount: total,
                remaining_amount: remaining,
                signed,
                created_at: now(),
            })
            .returning(Contract::as_returning())
            .get_result(conn)?;
        info!(contract = contract.id, customer = customer.id, "contract created");
        Ok(contract)
    })
}

pub fn list_contracts(conn: &mut DbConn, plan: &QueryPlan) -> CrmResult<Vec<Contract>> {
    let mut query = contracts::table.select(Contract::as_select()).into_boxed();
    for predicate in plan.predicates::<contracts::table>() {
        query = query.filter(predicate);
    }
    for ordering in plan.orderings() {
        query = query.then_order_by(ordering);
    }
    Ok(query.then_order_by(contracts::id.asc()).load(conn)?)
}

/// Validates a generic contract update against the current row.
///
/// Amounts are settled in a fixed order whatever the order of `updates`:
/// the new total first, then the remaining amount against that total.
pub fn contract_changes(
    contract: &Contract,
    has_event: bool,
    updates: &[(String, String)],
) -> CrmResult<ContractChanges> {
    if updates.is_empty() {
        return Err(CrmError::invalid("update", "nothing to update"));
    }
    let mut changes = ContractChanges::default();
    for (attribute, raw) in updates {
        let field = CONTRACT.updatable(attribute)?;
        match (field.name, coerce(field, raw)?) {
            ("total_amount", FieldValue::Amount(v)) => changes.total_amount = Some(v),
            ("remaining_amount", FieldValue::Amount(v)) => changes.remaining_amount = Some(v),
            ("signed", FieldValue::Boolean(v)) => changes.signed = Some(v),
            _ => return Err(CrmError::ImmutableAttribute(attribute.clone())),
        }
    }

    let total = changes
        .total_amount
        .as_ref()
        .unwrap_or(&contract.total_amount);
    ensure_positive(total, "total_amount")?;
    let remaining = changes
        .remaining_amount
        .as_ref()
        .unwrap_or(&contract.remaining_amount);
    ensure_within_total(remaining, total)?;

    if changes.signed == Some(false) && contract.signed && has_event {
        return Err(CrmError::invalid(
            "signed",
            format!(
                "contract {} already has an event and cannot be unsigned",
                contract.id
            ),
        ));
    }
    Ok(changes)
}

pub fn update_contract(
    conn: &mut DbConn,
    actor: &Actor,
    id: i32,
    updates: &[(String, String)],
) -> CrmResult<Contract> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let contract = find_contract(conn, id)?;
        ensure_owner_or_manager(actor, contract.sale_contact_id, &format!("contract {id}"))?;
        let with_event = has_event(conn, id)?;
        let changes = contract_changes(&contract, with_event, updates)?;
        let updated = diesel::update(contracts::table.find(id))
            .set(&changes)
            .returning(Contract::as_returning())
            .get_result(conn)?;
        info!(contract = id, actor = %actor.employee_number, "contract updated");
        Ok(updated)
    })
}

/// The contract's event goes with it.
pub fn delete_contract(conn: &mut DbConn, id: i32) -> CrmResult<Contract> {
    conn.transaction::<_, CrmError, _>(|conn| {
        let contract = find_contract(conn, id)?;
        diesel::delete(contracts::table.find(id)).execute(conn)?;
        info!(contract = id, "contract deleted");
        Ok(contract)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::{actor, seeded_connection};
    use crate::security::rbac::Department;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample(total: i64, remaining: i64, signed: bool) -> Contract {
        Contract {
            id: 1,
            customer_id: 1,
            sale_contact_id: Some(1),
            total_amount: Amount::from(total),
            remaining_amount: Amount::from(remaining),
            signed,
            created_at: now(),
        }
    }

    #[test]
    fn test_remaining_cannot_exceed_current_total() {
        let contract = sample(1000, 500, true);
        assert!(matches!(
            contract_changes(&contract, false, &pairs(&[("remaining_amount", "1000.01")])),
            Err(CrmError::InvalidValue { .. })
        ));
        assert!(contract_changes(&contract, false, &pairs(&[("remaining_amount", "1000")])).is_ok());
        assert!(contract_changes(&contract, false, &pairs(&[("remaining_amount", "0")])).is_ok());
    }

    #[test]
    fn test_total_applies_before_remaining_in_any_order() {
        let contract = sample(1000, 500, true);
        for updates in [
            pairs(&[("remaining_amount", "1800"), ("total_amount", "2000")]),
            pairs(&[("total_amount", "2000"), ("remaining_amount", "1800")]),
        ] {
            let changes = contract_changes(&contract, false, &updates).expect("valid");
            assert_eq!(changes.total_amount, Some(Amount::from(2000)));
            assert_eq!(changes.remaining_amount, Some(Amount::from(1800)));
        }
        for updates in [
            pairs(&[("remaining_amount", "900"), ("total_amount", "800")]),
            pairs(&[("total_amount", "800"), ("remaining_amount", "900")]),
        ] {
            assert!(contract_changes(&contract, false, &updates).is_err());
        }
    }

    #[test]
    fn test_lowering_total_below_remaining_rejected() {
        let contract = sample(1000, 500, true);
        assert!(contract_changes(&contract, false, &pairs(&[("total_amount", "400")])).is_err());
        assert!(contract_changes(&contract, false, &pairs(&[("total_amount", "0")])).is_err());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let contract = sample(1000, 500, true);
        assert!(contract_changes(&contract, false, &pairs(&[("remaining_amount", "-5")])).is_err());
    }

    #[test]
    fn test_cannot_unsign_with_event() {
        let contract = sample(1000, 500, true);
        assert!(matches!(
            contract_changes(&contract, true, &pairs(&[("signed", "non")])),
            Err(CrmError::InvalidValue { .. })
        ));
        assert!(contract_changes(&contract, false, &pairs(&[("signed", "non")])).is_ok());
        assert!(contract_changes(&contract, true, &pairs(&[("signed", "oui")])).is_ok());
        assert!(contract_changes(&contract, true, &pairs(&[("signed", "peut-etre")])).is_err());
    }

    #[test]
    fn test_immutable_contract_fields() {
        let contract = sample(1000, 500, true);
        assert!(matches!(
            contract_changes(&contract, false, &pairs(&[("customer_id", "2")])),
            Err(CrmError::ImmutableAttribute(_))
        ));
        assert!(matches!(
            contract_changes(&contract, false, &pairs(&[("discount", "2")])),
            Err(CrmError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_create_inherits_customer_contact() {
        let mut conn = seeded_connection();
        let contract = create_contract(
            &mut conn,
            &ContractDraft {
                customer_id: 3,
                total_amount: "4200.50".into(),
                remaining_amount: None,
                signed: None,
            },
        )
        .expect("created");

        assert_eq!(contract.sale_contact_id, Some(2));
        assert_eq!(contract.remaining_amount, contract.total_amount);
        assert_eq!(contract.total_amount.to_string(), "4200.50");
        assert!(!contract.signed);
    }

    #[test]
    fn test_create_validates_amounts() {
        let mut conn = seeded_connection();
        let mut draft = ContractDraft {
            customer_id: 1,
            total_amount: "0".into(),
            ..ContractDraft::default()
        };
        assert!(create_contract(&mut conn, &draft).is_err());

        draft.total_amount = "100".into();
        draft.remaining_amount = Some("150".into());
        assert!(create_contract(&mut conn, &draft).is_err());

        draft.remaining_amount = Some("0".into());
        assert!(create_contract(&mut conn, &draft).is_err());

        draft.customer_id = 42;
        draft.remaining_amount = None;
        assert!(matches!(
            create_contract(&mut conn, &draft),
            Err(CrmError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_checks_ownership_then_persists() {
        let mut conn = seeded_connection();
        let updates = pairs(&[("remaining_amount", "100")]);

        assert!(matches!(
            update_contract(&mut conn, &actor(2, Department::Commercial), 1, &updates),
            Err(CrmError::Unauthorized(_))
        ));
        let updated = update_contract(&mut conn, &actor(1, Department::Commercial), 1, &updates)
            .expect("owner may update");
        assert_eq!(updated.remaining_amount, Amount::from(100));
    }

    #[test]
    fn test_unsign_rejected_when_event_exists_in_store() {
        let mut conn = seeded_connection();
        let result = update_contract(
            &mut conn,
            &actor(5, Department::Management),
            1,
            &pairs(&[("signed", "false")]),
        );
        assert!(matches!(result, Err(CrmError::InvalidValue { .. })));
        assert!(find_contract(&mut conn, 1).expect("contract").signed);
    }
}
