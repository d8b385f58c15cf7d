pub mod database;
pub mod error;
pub mod messages;
pub mod row_helpers;
pub mod schema;
pub mod session_data;
pub mod sessions;

pub use database::Database;
pub use error::StoreError;
