//! Plain-text tables for command results.

use crate::core::shared::models::{Contract, Customer, Employee, Event, Role};
use crate::crm::rules::DATE_FORMAT;
use crate::security::rbac::Department;
use chrono::NaiveDateTime;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListContext {
    Create,
    List,
    Update,
    Delete,
}

pub trait Tabular {
    /// Singular, capitalised entity name.
    const ENTITY: &'static str;

    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn optional_text(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn optional_id(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn date(value: NaiveDateTime) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn optional_date(value: Option<NaiveDateTime>) -> String {
    value.map_or_else(|| "-".to_string(), date)
}

impl Tabular for Role {
    const ENTITY: &'static str = "Role";

    fn headers() -> &'static [&'static str] {
        &["id", "name", "description"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            optional_text(self.description.as_deref()),
        ]
    }
}

impl Tabular for Employee {
    const ENTITY: &'static str = "Employee";

    fn headers() -> &'static [&'static str] {
        &["id", "employee_number", "first_name", "last_name", "email", "role", "created_at"]
    }

    fn cells(&self) -> Vec<String> {
        let role = Department::from_id(self.role_id)
            .map_or_else(|| self.role_id.to_string(), |d| d.label().to_string());
        vec![
            self.id.to_string(),
            self.employee_number.clone(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.email.clone(),
            role,
            date(self.created_at),
        ]
    }
}

impl Tabular for Customer {
    const ENTITY: &'static str = "Customer";

    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "first_name",
            "last_name",
            "email",
            "phone",
            "company",
            "sale_contact_id",
            "created_at",
            "updated_at",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.email.clone(),
            optional_text(self.phone.as_deref()),
            optional_text(self.company.as_deref()),
            optional_id(self.sale_contact_id),
            date(self.created_at),
            date(self.updated_at),
        ]
    }
}

impl Tabular for Contract {
    const ENTITY: &'static str = "Contract";

    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "customer_id",
            "sale_contact_id",
            "total_amount",
            "remaining_amount",
            "signed",
            "created_at",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.customer_id.to_string(),
            optional_id(self.sale_contact_id),
            self.total_amount.to_string(),
            self.remaining_amount.to_string(),
            if self.signed { "yes" } else { "no" }.to_string(),
            date(self.created_at),
        ]
    }
}

impl Tabular for Event {
    const ENTITY: &'static str = "Event";

    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "contract_id",
            "support_contact_id",
            "start_date",
            "end_date",
            "location",
            "attendees",
            "notes",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.contract_id.to_string(),
            optional_id(self.support_contact_id),
            optional_date(self.start_date),
            optional_date(self.end_date),
            optional_text(self.location.as_deref()),
            optional_id(self.attendees),
            optional_text(self.notes.as_deref()),
        ]
    }
}

fn heading<T: Tabular>(count: usize, context: ListContext) -> String {
    let entity = T::ENTITY;
    match context {
        ListContext::Create => format!("{entity} created"),
        ListContext::Update if count == 1 => format!("{entity} updated"),
        ListContext::Update => format!("{count} {}s updated", entity.to_lowercase()),
        ListContext::Delete => format!("{entity} deleted"),
        ListContext::List => format!("{entity}s ({count})"),
    }
}

pub fn render_table<T: Tabular>(rows: &[T], context: ListContext) -> String {
    if rows.is_empty() && context == ListContext::List {
        return format!("No {}s found.\n", T::ENTITY.to_lowercase());
    }
    let headers = T::headers();
    let cells: Vec<Vec<String>> = rows.iter().map(Tabular::cells).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", heading::<T>(rows.len(), context));
    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

pub fn render_one<T: Tabular>(row: &T, context: ListContext) -> String {
    render_table(std::slice::from_ref(row), context)
}
