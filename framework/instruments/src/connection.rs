use clap::Args;

/// Environment variable carrying the run id into an execution unit.
pub const RUN_ID_ENV: &str = "RUN_ID";
/// Environment variable carrying the branch into an execution unit.
pub const BRANCH_ENV: &str = "BRANCH";
/// Environment variable carrying the number of scenarios dispatched for the run.
pub const TOTAL_SCENARIOS_ENV: &str = "TOTAL_SCENARIOS";
pub const METRICS_HOST_ENV: &str = "METRICS_HOST";
pub const METRICS_USER_ENV: &str = "METRICS_USER";
pub const METRICS_PASS_ENV: &str = "METRICS_PASS";
pub const METRICS_TLS_ENV: &str = "METRICS_TLS";
pub const METRICS_DB_ENV: &str = "METRICS_DB";

/// Connection settings for the InfluxDB instance that stores run records.
///
/// Parsed from the command line with environment fallbacks, so the same settings can be forwarded
/// verbatim into execution units with [MetricsConnection::to_env].
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct MetricsConnection {
    /// Host (and optional port) of the InfluxDB instance.
    #[arg(
        long = "metrics-host",
        global = true,
        env = METRICS_HOST_ENV,
        default_value = "127.0.0.1:8086"
    )]
    pub host: String,

    /// InfluxDB user.
    #[arg(long = "metrics-user", global = true, env = METRICS_USER_ENV, default_value = "")]
    pub user: String,

    /// InfluxDB password.
    #[arg(
        long = "metrics-pass",
        global = true,
        env = METRICS_PASS_ENV,
        default_value = "",
        hide_env_values = true
    )]
    pub password: String,

    /// Connect to InfluxDB over https.
    #[arg(
        long = "metrics-tls",
        global = true,
        env = METRICS_TLS_ENV,
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub tls: bool,

    /// InfluxDB database that run records are written to.
    #[arg(long = "metrics-db", global = true, env = METRICS_DB_ENV, default_value = "hangar")]
    pub database: String,
}

impl MetricsConnection {
    pub fn url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            return self.host.clone();
        }

        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }

    pub fn client(&self) -> influxdb::Client {
        let client = influxdb::Client::new(self.url(), &self.database);
        if self.user.is_empty() {
            client
        } else {
            client.with_auth(&self.user, &self.password)
        }
    }

    /// The `METRICS_*` environment an execution unit needs to report its own outcome.
    pub fn to_env(&self) -> Vec<(String, String)> {
        vec![
            (METRICS_HOST_ENV.to_string(), self.host.clone()),
            (METRICS_USER_ENV.to_string(), self.user.clone()),
            (METRICS_PASS_ENV.to_string(), self.password.clone()),
            (METRICS_TLS_ENV.to_string(), self.tls.to_string()),
            (METRICS_DB_ENV.to_string(), self.database.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(host: &str, tls: bool) -> MetricsConnection {
        MetricsConnection {
            host: host.to_string(),
            user: "hangar".to_string(),
            password: "secret".to_string(),
            tls,
            database: "hangar".to_string(),
        }
    }

    #[test]
    fn url_scheme_follows_tls() {
        assert_eq!("http://influx:8086", connection("influx:8086", false).url());
        assert_eq!("https://influx:8086", connection("influx:8086", true).url());
        assert_eq!("http://influx", connection("http://influx", true).url());
    }

    #[test]
    fn env_round_trips_the_settings() {
        let env = connection("influx:8086", true).to_env();

        assert!(env.contains(&(METRICS_HOST_ENV.to_string(), "influx:8086".to_string())));
        assert!(env.contains(&(METRICS_TLS_ENV.to_string(), "true".to_string())));
        assert!(env.contains(&(METRICS_PASS_ENV.to_string(), "secret".to_string())));
    }
}
