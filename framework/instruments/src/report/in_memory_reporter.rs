mod records_table;

use crate::report::in_memory_reporter::records_table::RecordRow;
use crate::report::OutcomeReporter;
use hangar_run_model::{Outcome, RunRecord};
use tabled::settings::Style;
use tabled::Table;

/// Keeps every reported outcome in memory and prints a table of them when finalized.
///
/// Useful when running scenarios locally without a metrics store, and as a test double.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    records: Vec<RunRecord>,
    quiet: bool,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not print the table on finalize.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub(crate) fn print_summary_of_records(&self) {
        println!("\nSummary of scenario outcomes");
        let rows = self
            .records
            .iter()
            .map(|record| RecordRow {
                scenario: record.scenario.clone(),
                outcome: record.outcome.to_string(),
                duration_s: record.duration_s,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
        println!(
            "{} succeeded, {} failed, {} unknown",
            self.count(Outcome::Success),
            self.count(Outcome::Failure),
            self.count(Outcome::Unknown)
        );
    }
}

impl OutcomeReporter for InMemoryReporter {
    fn report_outcome(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    async fn finalize(self) -> anyhow::Result<()> {
        if !self.quiet {
            self.print_summary_of_records();
        }
        Ok(())
    }
}
