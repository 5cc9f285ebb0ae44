use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

/// The recognized configuration surface. Every field here is loaded
/// from a TOML file (or environment overrides prefixed `USYNC_`) through
/// the `config` crate; nothing in the workspace reads `std::env::var`
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub nntp_host: String,
    pub nntp_port: u16,
    pub nntp_ssl: bool,
    pub nntp_username: String,
    pub nntp_password: String,
    pub nntp_group: String,
    pub segment_size: usize,
    pub max_connections: usize,
    pub upload_workers: usize,
    pub download_workers: usize,
    pub redundancy_copies: u32,
    pub upload_bps: u64,
    pub cache_size_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("usync.db"),
            nntp_host: String::new(),
            nntp_port: 563,
            nntp_ssl: true,
            nntp_username: String::new(),
            nntp_password: String::new(),
            nntp_group: "alt.binaries.usync".to_string(),
            segment_size: 768_000,
            max_connections: 10,
            upload_workers: 4,
            download_workers: 4,
            redundancy_copies: 0,
            upload_bps: 0,
            cache_size_mb: 256,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// anything the file doesn't specify, and allowing `USYNC_*`
    /// environment variables (e.g. `USYNC_NNTP_PASSWORD`) to override the
    /// file, the way `blocksense-network-agent-harbor`'s `config-core`
    /// layers file and environment sources.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("USYNC").separator("__"));

        let built = builder
            .build()
            .map_err(|e| crate::UsyncError::Validation(e.to_string()))?;

        built
            .try_deserialize()
            .map_err(|e| crate::UsyncError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_4() {
        let cfg = Config::default();
        assert_eq!(cfg.segment_size, 768_000);
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.redundancy_copies, 0);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_is_absent() {
        let cfg = Config::load("/nonexistent/usync.toml").unwrap();
        assert_eq!(cfg.nntp_port, 563);
    }

    #[test]
    fn load_reads_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usync.toml");
        std::fs::write(&path, "nntp_host = \"news.example.org\"\nmax_connections = 20\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.nntp_host, "news.example.org");
        assert_eq!(cfg.max_connections, 20);
    }
}
