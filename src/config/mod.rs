// Configuration module entry point
// Loads layered configuration: file, environment, command line, defaults

mod types;

use std::net::SocketAddr;
use std::time::Duration;

// Re-export public types
pub use types::{
    Config, ContentConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

/// Default config file, `config.toml` (extension resolved by the `config` crate)
pub const DEFAULT_CONFIG_FILE: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// A port given on the command line wins over file and environment.
    pub fn load_from(
        config_path: &str,
        port_override: Option<u16>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("content.range_forced_extensions")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("content.root", "./content")?
            .set_default("content.confine_to_root", true)?
            .set_default("content.range_forced_extensions", vec!["mp4"])?
            .set_default("http.server_name", "BBBserver")?
            .set_default("http.max_request_size", 8192)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?;

        if let Some(port) = port_override {
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.content.normalize_extensions();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would panic the runtime or drop every request
    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.workers == Some(0) {
            return Err(config::ConfigError::Message(
                "server.workers must be at least 1".to_string(),
            ));
        }
        if self.http.max_request_size == 0 {
            return Err(config::ConfigError::Message(
                "http.max_request_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl ContentConfig {
    /// Lowercase and strip leading dots so `.MP4` matches `mp4`
    fn normalize_extensions(&mut self) {
        for ext in &mut self.range_forced_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }
    }
}

impl PerformanceConfig {
    pub const fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub const fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }
}

/// Parse the optional positional port argument (`<binary> [port]`)
pub fn port_from_args(mut args: impl Iterator<Item = String>) -> Result<Option<u16>, String> {
    // Skip program name
    args.next();
    match args.next() {
        None => Ok(None),
        Some(arg) => arg
            .parse::<u16>()
            .map(Some)
            .map_err(|e| format!("Invalid port '{arg}': {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::static_files::test_support::ScratchDir;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|s| (*s).to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Load `contents` as `config.toml` from a scratch directory
    fn load_toml(tag: &str, contents: &str) -> Result<Config, config::ConfigError> {
        let dir = ScratchDir::new(tag);
        dir.write("config.toml", contents.as_bytes());
        let path = dir.path().join("config");
        Config::load_from(&path.to_string_lossy(), None)
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("does-not-exist/config", None).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.content.root, "./content");
        assert!(cfg.content.confine_to_root);
        assert_eq!(cfg.content.range_forced_extensions, vec!["mp4".to_string()]);
        assert_eq!(cfg.http.server_name, "BBBserver");
        assert_eq!(cfg.performance.max_connections, None);
        assert_eq!(cfg.logging.access_log_format, "common");
    }

    #[test]
    fn test_port_override() {
        let cfg = Config::load_from("does-not-exist/config", Some(9090)).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_port_from_args() {
        assert_eq!(port_from_args(args(&["bbbserver"])), Ok(None));
        assert_eq!(port_from_args(args(&["bbbserver", "8000"])), Ok(Some(8000)));
        assert!(port_from_args(args(&["bbbserver", "http"])).is_err());
        assert!(port_from_args(args(&["bbbserver", "70000"])).is_err());
    }

    #[test]
    fn test_file_values_are_loaded() {
        let cfg = load_toml(
            "config-file",
            "[server]\nworkers = 2\n\n[http]\nmax_request_size = 1024\n",
        )
        .unwrap();
        assert_eq!(cfg.server.workers, Some(2));
        assert_eq!(cfg.http.max_request_size, 1024);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = load_toml("config-workers", "[server]\nworkers = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.workers"), "{err}");
    }

    #[test]
    fn test_zero_max_request_size_rejected() {
        let err = load_toml("config-request-size", "[http]\nmax_request_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("http.max_request_size"), "{err}");
    }

    #[test]
    fn test_range_forced_extensions_normalized() {
        let mut content = ContentConfig {
            root: ".".to_string(),
            confine_to_root: true,
            range_forced_extensions: vec![".MP4".to_string(), "webm".to_string()],
        };
        content.normalize_extensions();
        assert_eq!(content.range_forced_extensions, vec!["mp4", "webm"]);
    }
}
