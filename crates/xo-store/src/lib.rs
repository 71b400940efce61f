pub mod database;
pub mod error;
pub mod games;
pub mod row_helpers;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
