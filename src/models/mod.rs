mod log;
mod movie;

pub use log::{LogEntry, LogQuery, SortField, SortOrder};
pub use movie::Movie;
