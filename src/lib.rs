pub mod cli;
pub mod core;
pub mod crm;
pub mod security;

pub use crate::core::config::AppConfig;
pub use crate::core::error::{CrmError, CrmResult};
