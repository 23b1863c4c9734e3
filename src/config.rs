//! WolfMirror Configuration
//!
//! This module provides configuration structures for the source and
//! destination endpoints, the ignore list and logging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::mirror::Endpoint;

/// Main WolfMirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Source endpoint
    pub src: EndpointConfig,

    /// Destination endpoint
    pub dst: EndpointConfig,

    /// Mirroring options
    #[serde(default)]
    pub option: OptionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection parameters for one endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Redis host
    pub host: String,

    /// Redis port
    #[serde(default = "default_port")]
    pub port: u16,

    /// ACL username (optional, Redis 6+)
    #[serde(default)]
    pub username: Option<String>,

    /// Password sent with AUTH (optional)
    #[serde(default)]
    pub password: Option<String>,

    /// Database index selected after connect
    #[serde(default)]
    pub db: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Mirroring options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionConfig {
    /// Keys excluded from listing, diffing, migration, deletion and replication
    #[serde(default)]
    pub ignore_key: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Secondary log file (optional)
    pub file: Option<PathBuf>,

    /// Include inline values in watch output
    #[serde(default)]
    pub verbose: bool,

    /// Colour status output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_port() -> u16 {
    6379
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            verbose: false,
            color: true,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: default_port(),
            username: None,
            password: None,
            db: 0,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl EndpointConfig {
    /// `host:port` address used to connect
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether both configs name the same server, treating every loopback
    /// spelling (`localhost`, `127.0.0.1`, `::1`) as one host
    pub fn same_server(&self, other: &EndpointConfig) -> bool {
        if self.port != other.port {
            return false;
        }
        match (self.is_loopback(), other.is_loopback()) {
            (true, true) => true,
            (false, false) => self.host.eq_ignore_ascii_case(&other.host),
            _ => false,
        }
    }

    fn is_loopback(&self) -> bool {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        host.eq_ignore_ascii_case("localhost")
            || host
                .parse::<std::net::IpAddr>()
                .map_or(false, |ip| ip.is_loopback())
    }

    fn validate(&self, role: Endpoint) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::Error::Config(format!("{}.host cannot be empty", role)));
        }

        if self.port == 0 {
            return Err(crate::Error::Config(format!("{}.port cannot be 0", role)));
        }

        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(crate::Error::Config(format!("{} timeouts must be positive", role)));
        }

        Ok(())
    }
}

impl MirrorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: MirrorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.src.validate(Endpoint::Source)?;
        self.dst.validate(Endpoint::Destination)?;

        if self.src.same_server(&self.dst) && self.src.db == self.dst.db {
            return Err(crate::Error::Config(
                "src and dst point at the same database".into(),
            ));
        }

        Ok(())
    }

    /// Connection parameters for an endpoint role
    pub fn endpoint(&self, endpoint: Endpoint) -> &EndpointConfig {
        match endpoint {
            Endpoint::Source => &self.src,
            Endpoint::Destination => &self.dst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[src]
host = "10.0.0.1"
port = 6379
password = "secret"

[dst]
host = "10.0.0.2"
db = 3

[option]
ignore_key = ["lock:global", "session:admin"]

[logging]
level = "debug"
verbose = true
"#;

        let config = MirrorConfig::from_str(toml).unwrap();
        assert_eq!(config.src.address(), "10.0.0.1:6379");
        assert_eq!(config.src.password.as_deref(), Some("secret"));
        assert_eq!(config.dst.port, 6379);
        assert_eq!(config.dst.db, 3);
        assert_eq!(config.option.ignore_key.len(), 2);
        assert!(config.logging.verbose);
        assert!(config.logging.file.is_none());
        assert_eq!(config.endpoint(Endpoint::Destination).host, "10.0.0.2");
    }

    #[test]
    fn test_option_table_is_optional() {
        let toml = r#"
[src]
host = "localhost"

[dst]
host = "localhost"
port = 6380
"#;

        let config = MirrorConfig::from_str(toml).unwrap();
        assert!(config.option.ignore_key.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.src.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_same_endpoint() {
        let toml = r#"
[src]
host = "localhost"

[dst]
host = "localhost"
"#;

        assert!(matches!(
            MirrorConfig::from_str(toml),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_loopback_aliases() {
        let toml = r#"
[src]
host = "localhost"

[dst]
host = "127.0.0.1"
"#;

        assert!(matches!(
            MirrorConfig::from_str(toml),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_same_server_detection() {
        let local = EndpointConfig {
            host: "localhost".into(),
            ..Default::default()
        };
        let v6 = EndpointConfig {
            host: "::1".into(),
            ..Default::default()
        };
        let remote = EndpointConfig {
            host: "10.0.0.9".into(),
            ..Default::default()
        };
        let other_port = EndpointConfig {
            port: 6380,
            ..Default::default()
        };

        assert!(local.same_server(&EndpointConfig::default()));
        assert!(v6.same_server(&local));
        assert!(!remote.same_server(&local));
        assert!(!other_port.same_server(&EndpointConfig::default()));
    }

    #[test]
    fn test_same_server_other_db_is_allowed() {
        let toml = r#"
[src]
host = "localhost"

[dst]
host = "127.0.0.1"
db = 1
"#;

        let config = MirrorConfig::from_str(toml).unwrap();
        assert!(config.src.same_server(&config.dst));
    }

    #[test]
    fn test_rejects_empty_host() {
        let toml = r#"
[src]
host = ""

[dst]
host = "localhost"
"#;

        assert!(MirrorConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[src]\nhost = \"a\"\n[dst]\nhost = \"b\"").unwrap();

        let config = MirrorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.src.host, "a");
        assert_eq!(config.dst.host, "b");
    }
}
