use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "trivia_arena";
const APP_NAME: &str = "trivia-arena-back";
// Keeps a dead server from stalling the supervisor longer than one backoff step.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings resolved from `MONGO_URI` / `MONGO_DB`.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options.
    pub options: ClientOptions,
    /// Database holding the trivia collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri` and tag the client; the database defaults to `trivia_arena`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        let database_name = db_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DB)
            .to_owned();

        Ok(Self {
            options,
            database_name,
        })
    }
}
