/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Trivia storage trait and its backends.
pub mod trivia_store;
