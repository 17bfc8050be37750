use libsql::Error as DbError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
