mod db;
mod error;

pub use db::DbClient;
pub use error::StorageError;
