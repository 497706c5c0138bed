pub mod models;
pub mod schema;
pub mod test_utils;
pub mod utils;

pub use schema::*;
