use crate::model::{Figure, RunReport};
use crate::query::RunRecordQueries;

/// Build the report for a run, issuing every query concurrently.
///
/// A query that fails leaves its figure unavailable and is logged, the rest of the report is
/// still produced.
pub async fn summarize_run<Q: RunRecordQueries>(queries: &Q, run_id: &str) -> RunReport {
    log::info!("Summarising run {}", run_id);

    let (stats, longest, shortest, total_scenarios, succeeded, failures) = futures::join!(
        queries.duration_stats(run_id),
        queries.longest(run_id),
        queries.shortest(run_id),
        queries.total_scenarios(run_id),
        queries.succeeded(run_id),
        queries.failures(run_id),
    );

    let (mean_duration_s, stddev_duration_s) = match stats {
        Ok(stats) => stats,
        Err(e) => {
            log::warn!("Duration statistics query failed: {:?}", e);
            (Figure::Unavailable, Figure::Unavailable)
        }
    };

    RunReport {
        run_id: run_id.to_string(),
        mean_duration_s,
        stddev_duration_s,
        longest: or_unavailable("longest scenario", longest),
        shortest: or_unavailable("shortest scenario", shortest),
        total_scenarios: or_unavailable("total scenarios", total_scenarios),
        succeeded: or_unavailable("succeeded count", succeeded),
        failures: or_unavailable("failed scenarios", failures),
    }
}

fn or_unavailable<T>(what: &str, result: anyhow::Result<Figure<T>>) -> Figure<T> {
    result.unwrap_or_else(|e| {
        log::warn!("Query for {} failed: {:?}", what, e);
        Figure::Unavailable
    })
}
