use serde::Serialize;

/// A value in a run report that may be missing.
///
/// A figure is `Unavailable` when its query returned nothing or failed. Each figure is
/// independent of the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Figure<T> {
    Value(T),
    Unavailable,
}

impl<T> Figure<T> {
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Figure::Value(v) => Some(v),
            Figure::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Figure::Value(_))
    }
}

impl<T> From<Option<T>> for Figure<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Figure::Value(v),
            None => Figure::Unavailable,
        }
    }
}

/// How long one scenario took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioDuration {
    pub scenario: String,
    pub duration_s: f64,
}

impl ScenarioDuration {
    pub fn new(scenario: impl Into<String>, duration_s: f64) -> Self {
        Self {
            scenario: scenario.into(),
            duration_s,
        }
    }
}

/// Statistics for a single run, read back from the run records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub mean_duration_s: Figure<f64>,
    pub stddev_duration_s: Figure<f64>,
    pub longest: Figure<ScenarioDuration>,
    pub shortest: Figure<ScenarioDuration>,
    /// The number of scenarios the run was dispatched with
    pub total_scenarios: Figure<u64>,
    /// Distinct scenarios with at least one successful record
    pub succeeded: Figure<u64>,
    pub failures: Figure<Vec<ScenarioDuration>>,
}

impl RunReport {
    /// Render as the plain text message sent to the notification channel.
    pub fn render(&self) -> String {
        let mut out = format!("Scenario run report for {}\n", self.run_id);

        out.push_str(&format!(
            "Mean duration: {}\n",
            seconds(self.mean_duration_s.as_value())
        ));
        out.push_str(&format!(
            "Standard deviation: {}\n",
            seconds(self.stddev_duration_s.as_value())
        ));
        out.push_str(&format!(
            "Longest scenario: {}\n",
            scenario(self.longest.as_value())
        ));
        out.push_str(&format!(
            "Shortest scenario: {}\n",
            scenario(self.shortest.as_value())
        ));
        out.push_str(&format!(
            "Total scenarios: {}\n",
            count(self.total_scenarios.as_value())
        ));
        out.push_str(&format!("Succeeded: {}\n", count(self.succeeded.as_value())));

        match &self.failures {
            Figure::Unavailable => out.push_str("Failed scenarios: unavailable\n"),
            Figure::Value(failures) if failures.is_empty() => {
                out.push_str("Failed scenarios: none\n")
            }
            Figure::Value(failures) => {
                out.push_str(&format!("Failed scenarios: {}\n", failures.len()));
                for (i, failure) in failures.iter().enumerate() {
                    out.push_str(&format!(
                        "{}. {} ({:.2}s)\n",
                        i + 1,
                        failure.scenario,
                        failure.duration_s
                    ));
                }
            }
        }

        out
    }
}

const UNAVAILABLE: &str = "unavailable";

fn seconds(value: Option<&f64>) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |v| format!("{:.2}s", v))
}

fn scenario(value: Option<&ScenarioDuration>) -> String {
    value.map_or_else(
        || UNAVAILABLE.to_string(),
        |v| format!("{} ({:.2}s)", v.scenario, v.duration_s),
    )
}

fn count(value: Option<&u64>) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), u64::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unavailable_report() {
        let report = RunReport {
            run_id: "abc123".to_string(),
            mean_duration_s: Figure::Unavailable,
            stddev_duration_s: Figure::Unavailable,
            longest: Figure::Unavailable,
            shortest: Figure::Unavailable,
            total_scenarios: Figure::Unavailable,
            succeeded: Figure::Unavailable,
            failures: Figure::Unavailable,
        };

        assert_eq!(
            "Scenario run report for abc123\n\
             Mean duration: unavailable\n\
             Standard deviation: unavailable\n\
             Longest scenario: unavailable\n\
             Shortest scenario: unavailable\n\
             Total scenarios: unavailable\n\
             Succeeded: unavailable\n\
             Failed scenarios: unavailable\n",
            report.render()
        );
    }

    #[test]
    fn failures_are_enumerated() {
        let report = RunReport {
            run_id: "abc123".to_string(),
            mean_duration_s: Figure::Value(21.5),
            stddev_duration_s: Figure::Unavailable,
            longest: Figure::Value(ScenarioDuration::new("wallet_test", 42.0)),
            shortest: Figure::Value(ScenarioDuration::new("name_import", 1.0)),
            total_scenarios: Figure::Value(12),
            succeeded: Figure::Value(0),
            failures: Figure::Value(vec![
                ScenarioDuration::new("wallet_test", 42.0),
                ScenarioDuration::new("name_import", 1.0),
            ]),
        };

        let text = report.render();
        assert!(text.contains("Mean duration: 21.50s\n"), "{text}");
        assert!(text.contains("Standard deviation: unavailable\n"), "{text}");
        assert!(text.contains("Longest scenario: wallet_test (42.00s)\n"), "{text}");
        assert!(text.contains("Succeeded: 0\n"), "{text}");
        assert!(
            text.ends_with("Failed scenarios: 2\n1. wallet_test (42.00s)\n2. name_import (1.00s)\n"),
            "{text}"
        );
    }
}
