use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::reorder_buffer::DEFAULT_REORDER_DEPTH;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source_host: String,
    pub source_port: u16,
    /// `None` when receiver reports are disabled.
    pub report_interval: Option<Duration>,
    pub renderer_output: RendererOutput,
    pub reorder_depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RendererOutput {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} env variable should be present")]
    Missing(&'static str),
    #[error("{name} should be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

const RTP_SOURCE_HOST_ENV: &str = "RTP_SOURCE_HOST";
const RTP_SOURCE_PORT_ENV: &str = "RTP_SOURCE_PORT";
const RTCP_REPORT_INTERVAL_MS_ENV: &str = "RTCP_REPORT_INTERVAL_MS";
const RENDERER_OUTPUT_ENV: &str = "RENDERER_OUTPUT";
const REORDER_DEPTH_ENV: &str = "REORDER_DEPTH";

const DEFAULT_REPORT_INTERVAL_MS: u64 = 5000;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let source_host = lookup(RTP_SOURCE_HOST_ENV)
            .ok_or(ConfigError::Missing(RTP_SOURCE_HOST_ENV))?
            .trim()
            .to_string();

        let source_port = lookup(RTP_SOURCE_PORT_ENV)
            .ok_or(ConfigError::Missing(RTP_SOURCE_PORT_ENV))
            .and_then(|value| parse(RTP_SOURCE_PORT_ENV, &value, "u16 integer"))?;

        let report_interval_ms = lookup(RTCP_REPORT_INTERVAL_MS_ENV)
            .map(|value| parse(RTCP_REPORT_INTERVAL_MS_ENV, &value, "u64 integer"))
            .transpose()?
            .unwrap_or(DEFAULT_REPORT_INTERVAL_MS);
        let report_interval =
            (report_interval_ms > 0).then(|| Duration::from_millis(report_interval_ms));

        let renderer_output = match lookup(RENDERER_OUTPUT_ENV) {
            None => RendererOutput::Stdout,
            Some(value) if value.trim() == "-" => RendererOutput::Stdout,
            Some(value) => RendererOutput::File(PathBuf::from(value.trim())),
        };

        let reorder_depth = lookup(REORDER_DEPTH_ENV)
            .map(|value| parse(REORDER_DEPTH_ENV, &value, "usize integer"))
            .transpose()?
            .unwrap_or(DEFAULT_REORDER_DEPTH);

        Ok(Config {
            source_host,
            source_port,
            report_interval,
            renderer_output,
            reorder_depth,
        })
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
        expected,
    })
}
