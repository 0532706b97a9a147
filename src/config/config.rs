use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreBackend;

/// Prefix shared by every environment variable the service reads.
pub const ENV_PREFIX: &str = "DUMBOMETRICS_";

/// Points at an alternative YAML file instead of `./config.yaml`.
pub const CONFIG_PATH_ENV: &str = "DUMBOMETRICS_CONFIG";

/// Service configuration.
///
/// Every field has a default, so an empty environment yields a working setup.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct Config {
    pub metrics_ip: IpAddr,
    pub metrics_port: u16,
    pub metrics_namespace: String,
    pub cache_backend: StoreBackend,
    pub cache_directory: PathBuf,
    /// Serve the `/example/*` demo routes.
    #[serde(default)]
    pub example_routes: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metrics_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            metrics_port: 9090,
            metrics_namespace: "dumbometrics".to_string(),
            cache_backend: StoreBackend::Filesystem,
            cache_directory: std::env::temp_dir().join("achetronic").join("dumbometrics"),
            example_routes: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.metrics_ip, self.metrics_port)
    }
}

/// The layered configuration sources: defaults, then the YAML file, then
/// `DUMBOMETRICS_*` environment variables (nested keys split on `__`).
pub fn figment() -> Figment {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "./config.yaml".to_string());
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
}

/// Extracts the configuration from `figment`, normalizing the namespace to lowercase.
pub fn extract_config(figment: &Figment) -> Result<Config, figment::Error> {
    let mut config: Config = figment.extract()?;
    config.metrics_namespace = config.metrics_namespace.to_lowercase();
    Ok(config)
}

/// Load config from the default sources.
pub fn load_config() -> Result<Config, figment::Error> {
    extract_config(&figment())
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
