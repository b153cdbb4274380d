mod logs;
mod movies;
mod schema;
mod store;

pub use logs::LogRepository;
pub use movies::MovieRepository;
pub use schema::SCHEMA_VERSION;
pub use store::Database;
