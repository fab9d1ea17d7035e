pub mod backend;
pub mod db;
pub mod error;
pub mod rest;
pub mod store;
pub mod types;

pub use backend::ExpiringRecordBackend;
pub use db::SqliteRecordStore;
pub use error::RecordError;
pub use rest::RestRecordStore;
pub use store::RecordStore;
pub use types::{AllowedUserRecord, RecordKey};
