//! Reads the run records of a finished run back from the metrics store, summarises them and sends
//! the summary to the notification channel.

mod frame;
mod memory;
mod model;
mod notify;
mod query;
mod report;

pub use frame::{LoadError, Row};
pub use memory::InMemoryRunRecordStore;
pub use model::{Figure, RunReport, ScenarioDuration};
pub use notify::{deliver, NotificationSink, SlackWebhookSink, StdoutSink};
pub use query::{InfluxRunRecordStore, RunRecordQueries};
pub use report::summarize_run;
