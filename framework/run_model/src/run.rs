use serde::{Deserialize, Serialize};

/// Longest namespace name, and longest label value, Kubernetes accepts.
const MAX_DNS_LABEL_LEN: usize = 63;
/// Longest pod name Kubernetes accepts.
const MAX_DNS_SUBDOMAIN_LEN: usize = 253;

/// One batch execution of a scenario set.
///
/// The commit identifier doubles as the run id. It is what units are tagged with, what the
/// cluster namespace is named after and what run records are looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// The commit the scenarios were built from
    pub run_id: String,
    /// The branch the commit belongs to
    pub branch: String,
}

impl Run {
    pub fn new(run_id: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            branch: branch.into(),
        }
    }

    /// Namespace that isolates this run's pods on the cluster.
    pub fn namespace(&self) -> String {
        dns_label(&self.run_id)
    }

    /// Name given to the local container that runs `scenario` for this run.
    pub fn unit_name(&self, scenario: &str) -> String {
        format!("{}-{}", scenario, self.run_id)
    }
}

/// Convert an arbitrary identifier into an RFC 1123 label.
///
/// Lowercases, replaces anything outside `[a-z0-9-]` with `-`, trims leading and trailing dashes
/// and truncates to 63 characters.
pub fn dns_label(value: &str) -> String {
    let label = value
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect::<String>();

    let label = label.trim_matches('-');
    let label = &label[..label.len().min(MAX_DNS_LABEL_LEN)];

    label.trim_end_matches('-').to_string()
}

/// Convert an arbitrary identifier into an RFC 1123 subdomain, as used for pod names.
///
/// Like [dns_label] but keeps dots and allows up to 253 characters.
pub fn dns_subdomain(value: &str) -> String {
    let name = value
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect::<String>();

    truncate_alphanumeric(&name, MAX_DNS_SUBDOMAIN_LEN)
}

/// Convert an arbitrary string into a valid label value.
///
/// Keeps case, underscores and dots, replaces anything else outside `[A-Za-z0-9]` with `-`,
/// and truncates to 63 characters that start and end with an alphanumeric.
pub fn label_value(value: &str) -> String {
    let value = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect::<String>();

    truncate_alphanumeric(&value, MAX_DNS_LABEL_LEN)
}

/// ASCII only by this point, so byte slicing is safe.
fn truncate_alphanumeric(value: &str, max_len: usize) -> String {
    let value = value.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    let value = &value[..value.len().min(max_len)];

    value
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}
