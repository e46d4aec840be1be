mod ledger;
mod outcome;
mod record;
mod run;

pub use ledger::{append_new_run_records, append_run_record, load_run_records, store_run_record};
pub use outcome::{Outcome, UnknownOutcomeError, FAILURE_MARKER, SUCCESS_MARKER};
pub use record::{RunRecord, ScenarioExecution, RUN_RECORD_MEASUREMENT};
pub use run::{dns_label, dns_subdomain, label_value, Run};
