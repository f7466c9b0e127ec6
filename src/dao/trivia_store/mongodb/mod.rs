mod config;
mod connection;
mod error;
mod models;
/// `TriviaStore` implementation over MongoDB collections.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoTriviaStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Malformed { id, reason } => StorageError::corrupted(id, reason),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
