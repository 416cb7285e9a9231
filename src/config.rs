//! Runtime configuration, read from the environment.
//!
//! | Variable                 | Default | Meaning                                  |
//! | ------------------------ | ------- | ---------------------------------------- |
//! | `SCSIGLASS_LOG`          | `info`  | `tracing_subscriber` filter directive    |
//! | `SCSIGLASS_TIMEOUT_MS`   | `5000`  | timeout for each USB transfer            |
//! | `SCSIGLASS_DEVICE`       | `0`     | which mass storage device to open        |
//! | `SCSIGLASS_BUFFER_SIZE`  | `65536` | bulk endpoint buffer size, in bytes      |

use std::str::FromStr;
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, ensure};

pub const LOG_VAR: &str = "SCSIGLASS_LOG";
pub const TIMEOUT_VAR: &str = "SCSIGLASS_TIMEOUT_MS";
pub const DEVICE_VAR: &str = "SCSIGLASS_DEVICE";
pub const BUFFER_SIZE_VAR: &str = "SCSIGLASS_BUFFER_SIZE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub timeout: Duration,
    /// Index into the list of mass storage devices, in enumeration order.
    pub device_index: usize,
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            timeout: Duration::from_millis(5000),
            device_index: 0,
            buffer_size: 64 * 1024,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from `lookup`, which maps a variable name to
    /// its value. Unset variables keep their defaults, malformed ones are an
    /// error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(filter) = lookup(LOG_VAR) {
            config.log_filter = filter;
        }
        if let Some(ms) = parse::<u64>(&lookup, TIMEOUT_VAR)? {
            ensure!(ms > 0, "{TIMEOUT_VAR} must be greater than zero");
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(index) = parse(&lookup, DEVICE_VAR)? {
            config.device_index = index;
        }
        if let Some(size) = parse::<usize>(&lookup, BUFFER_SIZE_VAR)? {
            // bulk transfers are split on the 512-byte high speed packet size
            ensure!(
                size >= 512 && size % 512 == 0,
                "{BUFFER_SIZE_VAR} must be a non-zero multiple of 512, was {size}"
            );
            config.buffer_size = size;
        }
        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .wrap_err_with(|| format!("invalid value {value:?} for {name}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(config(&[]).unwrap(), Config::default());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            (LOG_VAR, "scsiglass=debug"),
            (TIMEOUT_VAR, "250"),
            (DEVICE_VAR, " 2 "),
            (BUFFER_SIZE_VAR, "4096"),
        ])
        .unwrap();
        assert_eq!(config.log_filter, "scsiglass=debug");
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.device_index, 2);
        assert_eq!(config.buffer_size, 4096);
    }

    #[test]
    fn malformed_values_are_errors() {
        let e = config(&[(TIMEOUT_VAR, "soon")]).unwrap_err();
        assert!(e.to_string().contains(TIMEOUT_VAR));
        assert!(config(&[(TIMEOUT_VAR, "0")]).is_err());
        assert!(config(&[(DEVICE_VAR, "-1")]).is_err());
        assert!(config(&[(BUFFER_SIZE_VAR, "1000")]).is_err());
    }
}
