//! Domain services. Every function takes an open connection and returns
//! domain rows; access checks on the command itself happen before these run,
//! ownership checks on the resource happen inside.

pub mod auth;
pub mod contracts;
pub mod customers;
pub mod employees;
pub mod events;
pub mod fields;
pub mod query;
pub mod roles;
pub mod rules;
