use crate::record::RunRecord;
use anyhow::Context;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::Path;

/// Append a run record to a file
///
/// The record will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_record(record: &RunRecord, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open run ledger {}", path.display()))?;
    store_run_record(record, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Append the records that the ledger does not already hold, returning the ones that were added.
///
/// A record is already held when the ledger has one for the same run and scenario with the same
/// timestamp, so collecting the same finished executions twice does not duplicate them. A missing
/// ledger is created.
pub fn append_new_run_records(
    records: &[RunRecord],
    path: &Path,
) -> anyhow::Result<Vec<RunRecord>> {
    let existing = if path.exists() {
        load_run_records(path)?
    } else {
        Vec::new()
    };
    let mut seen = existing.iter().map(record_key).collect::<HashSet<_>>();

    let mut added = Vec::new();
    for record in records {
        if seen.insert(record_key(record)) {
            append_run_record(record, path)?;
            added.push(record.clone());
        }
    }

    Ok(added)
}

fn record_key(record: &RunRecord) -> (String, String, i64) {
    (record.run_id.clone(), record.scenario.clone(), record.timestamp)
}

/// Serialize the run record to a writer
pub fn store_run_record<W: Write>(record: &RunRecord, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, record)?;
    Ok(())
}

/// Load run records from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_record]. Blank lines are skipped.
pub fn load_run_records(path: &Path) -> anyhow::Result<Vec<RunRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open run ledger {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RunRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid run record on line {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Outcome, Run};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let run = Run::new("abc123", "main");

        let first = RunRecord::new(&run, "wallet_test", Outcome::Failure, Duration::from_secs(42))
            .with_total_scenarios(2);
        let second = RunRecord::new(&run, "name_import", Outcome::Success, Duration::from_secs(7))
            .with_total_scenarios(2);
        append_run_record(&first, &path).unwrap();
        append_run_record(&second, &path).unwrap();

        assert_eq!(vec![first, second], load_run_records(&path).unwrap());
    }

    #[test]
    fn records_already_in_the_ledger_are_not_appended_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let run = Run::new("abc123", "main");

        let failure = RunRecord::new(&run, "wallet_test", Outcome::Failure, Duration::from_secs(42))
            .with_timestamp(1_714_564_842);
        let success = RunRecord::new(&run, "name_import", Outcome::Success, Duration::from_secs(7))
            .with_timestamp(1_714_564_807);

        let added = append_new_run_records(std::slice::from_ref(&failure), &path).unwrap();
        assert_eq!(vec![failure.clone()], added);

        let added = append_new_run_records(&[failure.clone(), success.clone()], &path).unwrap();
        assert_eq!(vec![success.clone()], added);

        let records = load_run_records(&path).unwrap();
        assert_eq!(vec![failure, success], records);
        assert_eq!(1, records.iter().filter(|r| r.outcome == Outcome::Failure).count());
    }

    #[test]
    fn malformed_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "\n{not json}\n").unwrap();

        let err = load_run_records(&path).unwrap_err();
        assert_eq!("Invalid run record on line 2", err.to_string());
    }
}
