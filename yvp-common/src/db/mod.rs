//! Database schema, row models and read-side queries

pub mod init;
pub mod models;
pub mod query;

pub use init::*;
pub use models::*;
pub use query::*;
