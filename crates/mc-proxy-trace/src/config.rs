use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// Where and how session traces are written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    /// Directory holding the trace files. Created when tracing starts.
    pub output_dir: PathBuf,
    /// Gzip the trace files.
    pub compress: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./trace.d")
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: default_output_dir(),
            compress: false,
        }
    }
}

impl TraceConfig {
    /// `trace.<host>.<port>`, plus `.gz` when compressing.
    pub fn file_name(&self, client: SocketAddr) -> String {
        let suffix = if self.compress { ".gz" } else { "" };
        format!("trace.{}.{}{suffix}", client.ip(), client.port())
    }

    pub fn path_for(&self, client: SocketAddr) -> PathBuf {
        self.output_dir.join(self.file_name(client))
    }
}
