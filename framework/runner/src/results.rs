use hangar_run_model::{Outcome, ScenarioExecution};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ExecutionRow {
    scenario: String,
    unit: String,
    outcome: String,
    started: String,
    #[tabled(display = "duration_secs")]
    duration_s: Option<f64>,
}

fn duration_secs(d: &Option<f64>) -> String {
    match d {
        Some(d) => format!("{:.2}", d),
        None => "-".to_string(),
    }
}

/// Render executions as a table, followed by a count per outcome.
pub fn executions_table(executions: &[ScenarioExecution]) -> String {
    let rows = executions
        .iter()
        .map(|execution| ExecutionRow {
            scenario: execution.scenario.clone(),
            unit: execution.unit_id.chars().take(12).collect(),
            outcome: execution.outcome.to_string(),
            started: execution
                .started_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            duration_s: execution.duration().map(|d| d.as_secs_f64()),
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    let count = |outcome: Outcome| executions.iter().filter(|e| e.outcome == outcome).count();
    format!(
        "{table}\n{} succeeded, {} failed, {} unknown, {} running",
        count(Outcome::Success),
        count(Outcome::Failure),
        count(Outcome::Unknown),
        count(Outcome::Running) + count(Outcome::Pending)
    )
}
