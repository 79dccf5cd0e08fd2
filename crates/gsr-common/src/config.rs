use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

/// Selects the agent build variant when `STATION_BIN` is not set.
pub const ENV_TEST_VARIANT: &str = "TEST_VARIANT";
/// Absolute or relative path to the agent binary under test.
pub const ENV_STATION_BIN: &str = "STATION_BIN";
/// Extra whitespace-separated arguments appended to the agent command line.
pub const ENV_STATION_ARGS: &str = "STATION_ARGS";
/// PPS-loss reset threshold forwarded to the agent environment.
pub const ENV_PPS_RESET_THRES: &str = "NO_PPS_RESET_THRES";
/// PPS-loss reset failure threshold forwarded to the agent environment.
pub const ENV_PPS_RESET_FAIL_THRES: &str = "NO_PPS_RESET_FAIL_THRES";

fn default_variant() -> String {
    "testsim".to_owned()
}

fn default_global_timeout() -> Duration {
    Duration::from_secs(45)
}

fn default_pps_reset_thres() -> u32 {
    10
}

fn default_pps_reset_fail_thres() -> u32 {
    3
}

/// Environment-driven configuration for one harness invocation.
///
/// The harness deliberately takes no configuration file: CI wrappers drive
/// runs entirely through environment variables, and the defaults here match
/// that contract.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Agent binary launched per scenario.
    pub agent_binary: PathBuf,
    /// Extra arguments appended after the fixed `-p --temp .` contract.
    pub agent_args: Vec<String>,
    /// Wall-clock upper bound for one scenario, independent of its length.
    pub global_timeout: Duration,
    /// Forwarded as `NO_PPS_RESET_THRES` to the agent.
    pub pps_reset_thres: u32,
    /// Forwarded as `NO_PPS_RESET_FAIL_THRES` to the agent.
    pub pps_reset_fail_thres: u32,
}

impl HarnessConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let agent_binary = match lookup(ENV_STATION_BIN) {
            Some(path) => PathBuf::from(path),
            None => {
                let variant = lookup(ENV_TEST_VARIANT).unwrap_or_else(default_variant);
                Self::binary_for_variant(&variant)
            }
        };
        let agent_args = lookup(ENV_STATION_ARGS)
            .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        let pps_reset_thres = lookup(ENV_PPS_RESET_THRES)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(default_pps_reset_thres);
        let pps_reset_fail_thres = lookup(ENV_PPS_RESET_FAIL_THRES)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(default_pps_reset_fail_thres);

        let config = Self {
            agent_binary,
            agent_args,
            global_timeout: default_global_timeout(),
            pps_reset_thres,
            pps_reset_fail_thres,
        };
        debug!(agent = %config.agent_binary.display(), "harness configuration resolved");
        config
    }

    /// Conventional build output location for a named agent variant.
    fn binary_for_variant(variant: &str) -> PathBuf {
        PathBuf::from(format!("build-linux-{variant}/bin/station"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|value| (*value).to_owned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let vars = HashMap::new();
        let config = HarnessConfig::from_lookup(lookup_from(&vars));
        assert_eq!(
            config.agent_binary,
            PathBuf::from("build-linux-testsim/bin/station")
        );
        assert!(config.agent_args.is_empty());
        assert_eq!(config.pps_reset_thres, 10);
        assert_eq!(config.pps_reset_fail_thres, 3);
    }

    #[test]
    fn explicit_binary_wins_over_variant() {
        let mut vars = HashMap::new();
        vars.insert(ENV_STATION_BIN, "/opt/station/bin/station");
        vars.insert(ENV_TEST_VARIANT, "testms1302");
        let config = HarnessConfig::from_lookup(lookup_from(&vars));
        assert_eq!(config.agent_binary, PathBuf::from("/opt/station/bin/station"));
    }

    #[test]
    fn station_args_split_on_whitespace() {
        let mut vars = HashMap::new();
        vars.insert(ENV_STATION_ARGS, "--log-level DEBUG  --radio-init off");
        vars.insert(ENV_PPS_RESET_THRES, "7");
        let config = HarnessConfig::from_lookup(lookup_from(&vars));
        assert_eq!(
            config.agent_args,
            vec!["--log-level", "DEBUG", "--radio-init", "off"]
        );
        assert_eq!(config.pps_reset_thres, 7);
    }
}
