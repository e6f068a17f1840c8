use std::path::{Path, PathBuf};

use clap::Parser;
use mc_proxy_core::ProxyConfig;
use mc_proxy_trace::TraceConfig;
use serde::Deserialize;

pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 7777;
pub const DEFAULT_FORWARD_HOST: &str = "localhost";
pub const DEFAULT_FORWARD_PORT: u16 = 25565;

/// Minecraft man-in-the-middle proxy.
#[derive(Parser, Debug)]
#[command(name = "mc-proxy", version, about)]
pub struct Cli {
    /// Address on which to listen for connections, in [<host>][:<port>] format
    #[arg(short = 'L', long = "listen-address", value_name = "ADDRESS")]
    pub listen_address: Option<String>,

    /// Address of the server to which client connections are forwarded, in [<host>][:<port>] format
    #[arg(short = 'F', long = "forward-address", value_name = "ADDRESS")]
    pub forward_address: Option<String>,

    /// Enable tracing of packets to file
    #[arg(short = 't', long = "trace")]
    pub trace: bool,

    /// Output directory into which tracing files will be written (see --trace)
    #[arg(short = 'd', long = "trace-output-dir", value_name = "DIR")]
    pub trace_output_dir: Option<PathBuf>,

    /// Compress the tracing files (see --trace)
    #[arg(short = 'c', long = "compress")]
    pub compress: bool,

    /// Enable proof-of-concept code
    #[arg(short = 'P', long = "POC")]
    pub poc: bool,

    /// Only let in players listed in this allow-list file
    #[arg(short = 'a', long = "allow-list", value_name = "FILE")]
    pub allow_list: Option<PathBuf>,

    /// Read settings from this TOML file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Contents of the optional `proxy.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub proxy: ProxyConfig,
    pub trace: TraceConfig,
    pub allowlist: AllowListSection,
    pub gamestate: GameStateSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllowListSection {
    /// No file means no allow-list.
    pub file: Option<PathBuf>,
    pub enabled: bool,
}

impl Default for AllowListSection {
    fn default() -> Self {
        Self {
            file: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameStateSection {
    /// Track player and world state for every session.
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Everything the binary runs with, after flags are laid over the file.
#[derive(Debug)]
pub struct Settings {
    pub proxy: ProxyConfig,
    pub trace: TraceConfig,
    pub allowlist: AllowListSection,
    pub gamestate: GameStateSection,
    pub logging: LoggingSection,
    pub poc: bool,
}

impl Settings {
    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self, String> {
        let mut proxy = file.proxy;
        if let Some(listen) = &cli.listen_address {
            proxy.listen_address =
                normalize_address(listen, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT)?;
        }
        if let Some(forward) = &cli.forward_address {
            proxy.forward_address =
                normalize_address(forward, DEFAULT_FORWARD_HOST, DEFAULT_FORWARD_PORT)?;
        }

        let mut trace = file.trace;
        trace.enabled |= cli.trace;
        trace.compress |= cli.compress;
        if let Some(dir) = cli.trace_output_dir {
            trace.output_dir = dir;
        }

        let mut allowlist = file.allowlist;
        if let Some(path) = cli.allow_list {
            allowlist.file = Some(path);
        }

        Ok(Self {
            proxy,
            trace,
            allowlist,
            gamestate: file.gamestate,
            logging: file.logging,
            poc: cli.poc,
        })
    }
}

/// Expand `[host][:port]` to `host:port`, filling in whichever part is missing.
/// Bracketed IPv6 hosts (`[::1]:25565`) are accepted.
pub fn normalize_address(arg: &str, default_host: &str, default_port: u16) -> Result<String, String> {
    let arg = arg.trim();
    let (host, port) = if let Some(rest) = arg.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| format!("unclosed '[' in address {arg:?}"))?;
        let port = match after {
            "" => None,
            _ => Some(
                after
                    .strip_prefix(':')
                    .ok_or_else(|| format!("unexpected text after ']' in address {arg:?}"))?,
            ),
        };
        (format!("[{host}]"), port)
    } else {
        match arg.split_once(':') {
            Some((host, port)) => (host.trim().to_owned(), Some(port)),
            None => (arg.to_owned(), None),
        }
    };

    let host = if host.is_empty() || host == "[]" {
        default_host.to_owned()
    } else {
        host
    };
    let port = match port.map(str::trim) {
        None | Some("") => default_port,
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| format!("invalid port {port:?} in address {arg:?}"))?,
    };
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_missing_parts() {
        assert_eq!(normalize_address(":8000", "0.0.0.0", 7777).unwrap(), "0.0.0.0:8000");
        assert_eq!(normalize_address("mc.example.net", "localhost", 25565).unwrap(), "mc.example.net:25565");
        assert_eq!(normalize_address("mc.example.net:", "localhost", 25565).unwrap(), "mc.example.net:25565");
        assert_eq!(normalize_address("", "localhost", 25565).unwrap(), "localhost:25565");
        assert_eq!(normalize_address("10.1.2.3:25570", "localhost", 25565).unwrap(), "10.1.2.3:25570");
        assert_eq!(normalize_address("[::1]:9000", "localhost", 25565).unwrap(), "[::1]:9000");
        assert_eq!(normalize_address("[::1]", "localhost", 25565).unwrap(), "[::1]:25565");
        assert!(normalize_address("host:port", "localhost", 25565).is_err());
        assert!(normalize_address("host:70000", "localhost", 25565).is_err());
    }

    #[test]
    fn parses_every_section() {
        let config: FileConfig = toml::from_str(
            r#"
            [proxy]
            listen_address = "127.0.0.1:7000"
            compression_threshold = 256

            [trace]
            enabled = true
            compress = true

            [allowlist]
            file = "allow.json"
            enabled = false

            [gamestate]
            enabled = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.proxy.listen_address, "127.0.0.1:7000");
        assert_eq!(config.proxy.forward_address, "localhost:25565");
        assert_eq!(config.proxy.compression(), Some(256));
        assert!(config.trace.enabled && config.trace.compress);
        assert_eq!(config.trace.output_dir, PathBuf::from("./trace.d"));
        assert_eq!(config.allowlist.file, Some(PathBuf::from("allow.json")));
        assert!(!config.allowlist.enabled);
        assert!(config.gamestate.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.proxy.listen_address, "0.0.0.0:7777");
        assert!(!config.trace.enabled);
        assert!(config.allowlist.file.is_none());
        assert!(config.allowlist.enabled);
        assert!(!config.gamestate.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn flags_override_the_file() {
        let cli = Cli::try_parse_from([
            "mc-proxy", "-L", ":8000", "-F", "backend", "-t", "-c", "-d", "/tmp/traces", "-P", "-a",
            "players.json",
        ])
        .unwrap();
        let settings = Settings::resolve(cli, FileConfig::default()).unwrap();
        assert_eq!(settings.proxy.listen_address, "0.0.0.0:8000");
        assert_eq!(settings.proxy.forward_address, "backend:25565");
        assert!(settings.trace.enabled && settings.trace.compress);
        assert_eq!(settings.trace.output_dir, PathBuf::from("/tmp/traces"));
        assert!(settings.poc);
        assert_eq!(settings.allowlist.file, Some(PathBuf::from("players.json")));

        let cli = Cli::try_parse_from(["mc-proxy", "--POC", "--allow-list", "a.json"]).unwrap();
        assert!(cli.poc);
        let settings = Settings::resolve(cli, FileConfig::default()).unwrap();
        assert_eq!(settings.proxy.listen_address, "0.0.0.0:7777");
        assert!(!settings.trace.enabled);
    }

    #[test]
    fn bad_address_flag_is_an_error() {
        let cli = Cli::try_parse_from(["mc-proxy", "-F", "backend:x"]).unwrap();
        assert!(Settings::resolve(cli, FileConfig::default()).is_err());
    }
}
