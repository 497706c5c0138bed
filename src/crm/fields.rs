//! Per-entity field registries.
//!
//! Every attribute a user can name on the command line is declared here.
//! Filtering, sorting and updates resolve names through these tables and
//! nothing else, so column names spliced into SQL always come from this file.

use crate::core::error::{CrmError, CrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    Decimal,
    Boolean,
    DateTime,
}

/// How a raw string becomes a typed value on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Read-only; rejected before any coercion.
    Fixed,
    Name { max: usize },
    OptionalText { max: usize },
    Email,
    Phone,
    RoleId,
    Amount,
    YesNo,
    Timestamp,
    Attendees,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub rule: FieldRule,
    /// Never filterable, sortable or displayed.
    pub secret: bool,
}

impl FieldSpec {
    const fn fixed(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            rule: FieldRule::Fixed,
            secret: false,
        }
    }

    const fn mutable(name: &'static str, kind: FieldKind, rule: FieldRule) -> Self {
        Self {
            name,
            kind,
            rule,
            secret: false,
        }
    }

    const fn secret(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            rule: FieldRule::Fixed,
            secret: true,
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.rule != FieldRule::Fixed
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    pub entity: &'static str,
    pub fields: &'static [FieldSpec],
}

impl EntitySchema {
    fn find(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn unknown(&self, name: &str) -> CrmError {
        CrmError::UnknownAttribute {
            entity: self.entity,
            attribute: name.to_string(),
        }
    }

    /// Field usable in filters and sorts.
    pub fn queryable(&self, name: &str) -> CrmResult<&'static FieldSpec> {
        match self.find(name) {
            Some(field) if !field.secret => Ok(field),
            _ => Err(self.unknown(name)),
        }
    }

    /// Field usable in a generic update.
    pub fn updatable(&self, name: &str) -> CrmResult<&'static FieldSpec> {
        let field = self.find(name).ok_or_else(|| self.unknown(name))?;
        if !field.is_mutable() {
            return Err(CrmError::ImmutableAttribute(name.to_string()));
        }
        Ok(field)
    }

    pub fn mutable_names(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.is_mutable())
            .map(|f| f.name)
            .collect()
    }
}

pub const NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 100;
pub const PHONE_MAX: usize = 15;
pub const COMPANY_MAX: usize = 100;
pub const LOCATION_MAX: usize = 255;
pub const NOTES_MAX: usize = 255;

use FieldKind::*;

pub static EMPLOYEE: EntitySchema = EntitySchema {
    entity: "employee",
    fields: &[
        FieldSpec::fixed("id", Integer),
        FieldSpec::fixed("employee_number", Text),
        FieldSpec::mutable("first_name", Text, FieldRule::Name { max: NAME_MAX }),
        FieldSpec::mutable("last_name", Text, FieldRule::Name { max: NAME_MAX }),
        FieldSpec::mutable("email", Text, FieldRule::Email),
        FieldSpec::secret("password"),
        FieldSpec::mutable("role_id", Integer, FieldRule::RoleId),
        FieldSpec::fixed("created_at", DateTime),
    ],
};

pub static CUSTOMER: EntitySchema = EntitySchema {
    entity: "customer",
    fields: &[
        FieldSpec::fixed("id", Integer),
        FieldSpec::mutable("first_name", Text, FieldRule::Name { max: NAME_MAX }),
        FieldSpec::mutable("last_name", Text, FieldRule::Name { max: NAME_MAX }),
        FieldSpec::mutable("email", Text, FieldRule::Email),
        FieldSpec::mutable("phone", Text, FieldRule::Phone),
        FieldSpec::mutable("company", Text, FieldRule::OptionalText { max: COMPANY_MAX }),
        FieldSpec::fixed("sale_contact_id", Integer),
        FieldSpec::fixed("created_at", DateTime),
        FieldSpec::fixed("updated_at", DateTime),
    ],
};

pub static CONTRACT: EntitySchema = EntitySchema {
    entity: "contract",
    fields: &[
        FieldSpec::fixed("id", Integer),
        FieldSpec::fixed("customer_id", Integer),
        FieldSpec::fixed("sale_contact_id", Integer),
        FieldSpec::mutable("total_amount", Decimal, FieldRule::Amount),
        FieldSpec::mutable("remaining_amount", Decimal, FieldRule::Amount),
        FieldSpec::mutable("signed", Boolean, FieldRule::YesNo),
        FieldSpec::fixed("created_at", DateTime),
    ],
};

pub static EVENT: EntitySchema = EntitySchema {
    entity: "event",
    fields: &[
        FieldSpec::fixed("id", Integer),
        FieldSpec::mutable("name", Text, FieldRule::Name { max: NAME_MAX }),
        FieldSpec::fixed("contract_id", Integer),
        FieldSpec::fixed("support_contact_id", Integer),
        FieldSpec::mutable("start_date", DateTime, FieldRule::Timestamp),
        FieldSpec::mutable("end_date", DateTime, FieldRule::Timestamp),
        FieldSpec::mutable("location", Text, FieldRule::OptionalText { max: LOCATION_MAX }),
        FieldSpec::mutable("attendees", Integer, FieldRule::Attendees),
        FieldSpec::mutable("notes", Text, FieldRule::OptionalText { max: NOTES_MAX }),
        FieldSpec::fixed("created_at", DateTime),
    ],
};
