use clap::{Parser, ValueEnum};
use census_core::query::QueryLimits;
use census_core::query::limits::{
    DEFAULT_MAX_CELLS_CEILING,
    DEFAULT_MAX_GENES_CEILING,
    DEFAULT_MAX_ROWS_CEILING,
};
use std::error::Error;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_CENSUS_VERSION: &str = "stable";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Release directory setting that selects the published CELLxGENE directory.
pub const PUBLIC_RELEASE_DIRECTORY: &str = "public";

#[derive(Parser, Debug)]
#[command(name = "census-mcpd", version, about = "CELLxGENE Census MCP daemon.")]
struct CliArgs {
    /// stdio, http (alias streamable-http) or sse.
    #[arg(
        long,
        env = "MCP_TRANSPORT",
        default_value_t = Transport::Stdio,
        value_parser = parse_transport
    )]
    transport: Transport,

    #[arg(long, env = "MCP_HOST", default_value = DEFAULT_HOST)]
    host: String,

    #[arg(
        long,
        env = "MCP_PORT",
        default_value_t = DEFAULT_PORT,
        value_parser = positive_or(DEFAULT_PORT)
    )]
    port: u16,

    /// Release name or alias (`stable`, `latest`).
    #[arg(long, env = "CELLXGENE_CENSUS_VERSION", default_value = DEFAULT_CENSUS_VERSION)]
    census_version: String,

    /// Root of the local Census snapshot.
    #[arg(long, env = "CELLXGENE_SNAPSHOT_DIR")]
    snapshot_dir: Option<String>,

    /// Remote release directory to list releases from instead of `release.json`.
    /// `public` selects the published CELLxGENE directory.
    #[arg(long, env = "CELLXGENE_RELEASE_DIRECTORY_URL")]
    release_directory_url: Option<String>,

    #[arg(
        long,
        env = "CELLXGENE_UPSTREAM_TIMEOUT_SECS",
        default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS,
        value_parser = positive_or(DEFAULT_UPSTREAM_TIMEOUT_SECS)
    )]
    upstream_timeout_secs: u64,

    #[arg(
        long,
        env = "CELLXGENE_MAX_ROWS",
        default_value_t = DEFAULT_MAX_ROWS_CEILING,
        value_parser = positive_or(DEFAULT_MAX_ROWS_CEILING)
    )]
    max_rows: usize,

    #[arg(
        long,
        env = "CELLXGENE_MAX_CELLS",
        default_value_t = DEFAULT_MAX_CELLS_CEILING,
        value_parser = positive_or(DEFAULT_MAX_CELLS_CEILING)
    )]
    max_cells: usize,

    #[arg(
        long,
        env = "CELLXGENE_MAX_GENES",
        default_value_t = DEFAULT_MAX_GENES_CEILING,
        value_parser = positive_or(DEFAULT_MAX_GENES_CEILING)
    )]
    max_genes: usize,
}

/// Transport the daemon serves MCP over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    #[default]
    Stdio,
    #[value(aliases = ["streamable-http", "streamable_http"])]
    Http,
    Sse,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
        })
    }
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct CensusConfig {
    pub transport: Transport,
    pub addr: SocketAddr,
    pub census_version: String,
    pub snapshot_dir: PathBuf,
    pub release_directory_url: Option<String>,
    pub upstream_timeout: Duration,
    pub limits: QueryLimits,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl CensusConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

/// Blank transport settings fall back to stdio.
fn parse_transport(raw: &str) -> Result<Transport, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Transport::default());
    }
    Transport::from_str(raw, true)
}

/// Parses a count that must be at least one; blank input keeps `default`.
fn positive_or<T>(
    default: T,
) -> impl Fn(&str) -> Result<T, String> + Clone + Send + Sync + 'static
where
    T: TryFrom<u64> + Copy + Send + Sync + 'static,
{
    move |raw: &str| {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(default);
        }
        let value: u64 = raw
            .parse()
            .map_err(|err: std::num::ParseIntError| err.to_string())?;
        if value == 0 {
            return Err("must be at least 1".to_string());
        }
        T::try_from(value).map_err(|_| format!("{value} is out of range"))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::InvalidSetting {
            name: "MCP_HOST",
            value: host.to_string(),
        })
}

impl TryFrom<CliArgs> for CensusConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let host = non_blank(Some(args.host)).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let addr = resolve_addr(&host, args.port)?;

        let snapshot_dir = non_blank(args.snapshot_dir)
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingSetting("CELLXGENE_SNAPSHOT_DIR"))?;

        let release_directory_url = non_blank(args.release_directory_url);
        if let Some(url) = &release_directory_url
            && url != PUBLIC_RELEASE_DIRECTORY
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidSetting {
                name: "CELLXGENE_RELEASE_DIRECTORY_URL",
                value: url.clone(),
            });
        }

        Ok(Self {
            transport: args.transport,
            addr,
            census_version: non_blank(Some(args.census_version))
                .unwrap_or_else(|| DEFAULT_CENSUS_VERSION.to_string()),
            snapshot_dir,
            release_directory_url,
            upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
            limits: QueryLimits::new(args.max_rows, args.max_cells, args.max_genes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            transport: Transport::Stdio,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            census_version: DEFAULT_CENSUS_VERSION.to_string(),
            snapshot_dir: Some("/var/lib/census".to_string()),
            release_directory_url: None,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            max_rows: DEFAULT_MAX_ROWS_CEILING,
            max_cells: DEFAULT_MAX_CELLS_CEILING,
            max_genes: DEFAULT_MAX_GENES_CEILING,
        }
    }

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(
            ["census-mcpd", "--snapshot-dir", "/var/lib/census"]
                .iter()
                .chain(args)
                .copied(),
        )
    }

    #[test]
    fn defaults_apply_when_settings_are_unset() {
        let config = CensusConfig::try_from(base_args()).expect("config should parse");

        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.addr, SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)));
        assert_eq!(config.census_version, "stable");
        assert_eq!(config.snapshot_dir, PathBuf::from("/var/lib/census"));
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.limits, QueryLimits::default());
        assert!(config.release_directory_url.is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let args = parse(&[
            "--transport",
            "  ",
            "--port",
            "",
            "--census-version",
            " ",
            "--max-rows",
            "",
        ])
        .expect("blank values should parse");

        let config = CensusConfig::try_from(args).expect("config should parse");

        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert_eq!(config.census_version, "stable");
        assert_eq!(config.limits.max_rows, DEFAULT_MAX_ROWS_CEILING);
    }

    #[test]
    fn transport_accepts_streamable_http_alias() {
        let args = parse(&[
            "--transport",
            "Streamable-HTTP",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
        ])
        .expect("args should parse");

        let config = CensusConfig::try_from(args).expect("config should parse");

        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
    }

    #[test]
    fn snapshot_dir_is_required() {
        let mut args = base_args();
        args.snapshot_dir = Some(String::new());

        let err = CensusConfig::try_from(args).expect_err("snapshot dir missing");

        assert!(matches!(err, ConfigError::MissingSetting("CELLXGENE_SNAPSHOT_DIR")));
    }

    #[test]
    fn zero_ceilings_and_timeouts_are_rejected() {
        assert!(parse(&["--max-cells", "0"]).is_err());
        assert!(parse(&["--upstream-timeout-secs", "0"]).is_err());
        assert!(parse(&["--port", "0"]).is_err());

        let args = parse(&["--max-cells", "25", "--upstream-timeout-secs", "5"])
            .expect("positive values parse");
        let config = CensusConfig::try_from(args).expect("config should parse");
        assert_eq!(config.limits.max_cells, 25);
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_transport_and_bad_numbers_are_invalid() {
        assert!(parse(&["--transport", "websocket"]).is_err());
        assert!(parse(&["--max-genes", "lots"]).is_err());
        assert!(parse(&["--port", "70000"]).is_err());

        let mut args = base_args();
        args.release_directory_url = Some(PUBLIC_RELEASE_DIRECTORY.to_string());
        assert!(CensusConfig::try_from(args).is_ok());

        let mut args = base_args();
        args.release_directory_url = Some("ftp://example.org/release.json".to_string());
        assert!(matches!(
            CensusConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "CELLXGENE_RELEASE_DIRECTORY_URL", .. })
        ));
    }
}
