use crate::core::shared::models::{
    Amount, NewContract, NewCustomer, NewEmployee, NewEvent,
};
use crate::core::shared::schema::{contracts, customers, employees, events};
use crate::core::shared::utils::{establish_connection, now, DbConn};
use crate::security::jwt::{TokenConfig, TokenService};
use crate::security::password::{Argon2Config, PasswordPolicy, SecretHasher};
use crate::security::rbac::{Actor, Department};
use chrono::NaiveDateTime;
use diesel::prelude::*;

pub const TEST_SECRET: &str = "test-secret-key-for-unit-tests-only-0123456789";
pub const TEST_PASSWORD: &str = "password";

/// Empty store with the schema and the three roles.
pub fn test_connection() -> DbConn {
    establish_connection(":memory:").expect("Failed to open in-memory database")
}

pub fn test_hasher() -> SecretHasher {
    SecretHasher::new(Argon2Config::low_cost(), PasswordPolicy::default())
        .expect("Failed to build test hasher")
}

pub fn test_token_service() -> TokenService {
    TokenService::new(TokenConfig::default(), TEST_SECRET).expect("Failed to build token service")
}

pub fn actor(id: i32, department: Department) -> Actor {
    Actor {
        id,
        employee_number: format!("EMP{id:04}"),
        department,
    }
}

fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("Invalid fixture date")
}

/// Store populated with a small company:
///
/// | id | employee        | department |
/// |----|-----------------|------------|
/// | 1  | Alice Dupont    | Commercial |
/// | 2  | Marie Curie     | Commercial |
/// | 3  | Bob Martin      | Support    |
/// | 4  | Zoe Guerin      | Support    |
/// | 5  | Charlie Durand  | Management |
/// | 6  | Nicolas Hulot   | Management |
///
/// Customers 1 and 2 belong to Alice, customer 3 to Marie. Contracts 1 and 2
/// are customer 1's, 3 is customer 2's, 4 (unsigned) and 5 customer 3's.
/// Events exist on contracts 1 (supported by Bob), 2 and 3 (unassigned).
/// Every employee's password is [`TEST_PASSWORD`].
pub fn seeded_connection() -> DbConn {
    let mut conn = test_connection();
    seed(&mut conn).expect("Failed to seed test database");
    conn
}

pub fn seed(conn: &mut DbConn) -> QueryResult<()> {
    let password = test_hasher()
        .hash(TEST_PASSWORD)
        .expect("Failed to hash fixture password");
    let staff = [
        ("Alice", "Dupont", Department::Commercial),
        ("Marie", "Curie", Department::Commercial),
        ("Bob", "Martin", Department::Support),
        ("Zoe", "Guerin", Department::Support),
        ("Charlie", "Durand", Department::Management),
        ("Nicolas", "Hulot", Department::Management),
    ];
    let rows: Vec<NewEmployee> = staff
        .iter()
        .enumerate()
        .map(|(i, (first, last, department))| NewEmployee {
            employee_number: format!("EMP{:04}", i + 1),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{}.{}@epicevents.com", first, last).to_lowercase(),
            password: password.clone(),
            role_id: department.id(),
            created_at: now(),
        })
        .collect();
    for row in &rows {
        diesel::insert_into(employees::table).values(row).execute(conn)?;
    }

    let clients = [
        ("David", "Lambert", "david@lambert.fr", Some("Lambert SA"), 1),
        ("Eva", "Moreau", "eva@moreau.fr", None, 1),
        ("Frank", "Petit", "frank@petit.fr", Some("Petit & Fils"), 2),
    ];
    for (first, last, email, company, contact) in clients {
        diesel::insert_into(customers::table)
            .values(&NewCustomer {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
                phone: Some("0102030405".to_string()),
                company: company.map(str::to_string),
                sale_contact_id: Some(contact),
                created_at: now(),
                updated_at: now(),
            })
            .execute(conn)?;
    }

    let deals = [
        (1, 1, 1000, 500, true),
        (1, 1, 2000, 1500, true),
        (2, 1, 2500, 2500, true),
        (3, 2, 3000, 3000, false),
        (3, 2, 6000, 0, true),
    ];
    for (customer, contact, total, remaining, signed) in deals {
        diesel::insert_into(contracts::table)
            .values(&NewContract {
                customer_id: customer,
                sale_contact_id: Some(contact),
                total_amount: Amount::from(total),
                remaining_amount: Amount::from(remaining),
                signed,
                created_at: now(),
            })
            .execute(conn)?;
    }

    let gatherings = [
        ("Finale Coupe", 1, Some(3), "2024-06-01 18:00", "2024-06-01 23:00", "Parc des Princes"),
        ("Gala annuel", 2, None, "2024-07-10 19:00", "2024-07-11 01:00", "Pavillon Dauphine"),
        ("Seminaire", 3, None, "2024-08-20 09:00", "2024-08-21 17:00", "Chateau de Versailles"),
    ];
    for (name, contract, support, start, end, location) in gatherings {
        diesel::insert_into(events::table)
            .values(&NewEvent {
                name: name.to_string(),
                contract_id: contract,
                support_contact_id: support,
                start_date: Some(at(start)),
                end_date: Some(at(end)),
                location: Some(location.to_string()),
                attendees: Some(150),
                notes: None,
                created_at: now(),
            })
            .execute(conn)?;
    }
    Ok(())
}
