mod connection;
mod report;

pub use connection::*;
pub use report::{InMemoryReporter, InfluxClientReporter, OutcomeReporter};
pub use report::run_record_query;
