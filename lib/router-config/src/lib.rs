mod env_overrides;
pub mod fused_schema;
pub mod log;
pub mod override_subgraph_urls;
pub mod query_planner;
pub mod traffic_shaping;

use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use crate::env_overrides::EnvVarOverrides;
use crate::{
    env_overrides::EnvVarOverridesError, fused_schema::FusedSchemaConfig, log::LoggingConfig,
    override_subgraph_urls::OverrideSubgraphUrlsConfig, query_planner::QueryPlannerConfig,
    traffic_shaping::TrafficShapingConfig,
};

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FusionRouterConfig {
    #[serde(skip)]
    root_directory: PathBuf,

    /// The logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Location of the fused schema. By default `./fused.graphql` is used.
    #[serde(default)]
    pub fused_schema: FusedSchemaConfig,

    /// Query planning configuration.
    #[serde(default)]
    pub query_planner: QueryPlannerConfig,

    /// Controls how requests are being executed to subgraphs.
    #[serde(default)]
    pub traffic_shaping: TrafficShapingConfig,

    /// Configuration for overriding subgraph URLs.
    #[serde(default)]
    pub override_subgraph_urls: OverrideSubgraphUrlsConfig,
}

impl FusionRouterConfig {
    /// Directory that relative paths in the configuration resolve against.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn fused_schema_path(&self) -> PathBuf {
        self.fused_schema.resolve(&self.root_directory)
    }

    pub fn load_fused_schema(&self) -> Result<String, RouterConfigError> {
        self.fused_schema
            .load(&self.root_directory)
            .map_err(RouterConfigError::FusedSchemaReadError)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to get the current directory: {0}")]
    CurrentDirError(std::io::Error),
    #[error("{0}")]
    FusedSchemaReadError(std::io::Error),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "router.config.yaml",
    "router.config.yml",
    "router.config.json",
];

fn get_current_dir() -> Result<PathBuf, RouterConfigError> {
    std::env::current_dir().map_err(RouterConfigError::CurrentDirError)
}

/// Reads the configuration from `config_path`, or from the first `router.config.*` file in the
/// working directory, then applies the environment variable overrides.
pub fn load_config(config_path: Option<&str>) -> Result<FusionRouterConfig, RouterConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    load_config_with_overrides(config_path, env_overrides)
}

pub fn load_config_with_overrides(
    config_path: Option<&str>,
    env_overrides: EnvVarOverrides,
) -> Result<FusionRouterConfig, RouterConfigError> {
    let mut config = Config::builder();
    let mut root_directory = get_current_dir()?;

    match config_path {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent() {
                root_directory = root_directory.join(parent);
            }
            config = config.add_source(File::from(path).required(true));
        }
        None => {
            for name in DEFAULT_FILE_NAMES {
                config = config.add_source(File::with_name(name).required(false));
            }
        }
    }

    config = env_overrides.apply_overrides(config)?;

    let mut loaded = config.build()?.try_deserialize::<FusionRouterConfig>()?;
    loaded.root_directory = root_directory;

    Ok(loaded)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<FusionRouterConfig, RouterConfigError> {
    let mut parsed = Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<FusionRouterConfig>()?;
    parsed.root_directory = get_current_dir()?;

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        load_config_with_overrides,
        log::{LogFormat, LogLevel},
        parse_yaml_config, EnvVarOverrides,
    };

    fn fixture_path() -> String {
        format!("{}/fixture/router.config.yaml", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_yaml_config("{}").unwrap();

        assert_eq!(config.fused_schema.path, "fused.graphql");
        assert!(!config.query_planner.allow_expose);
        assert_eq!(config.query_planner.timeout, Duration::from_secs(10));
        assert_eq!(config.query_planner.cache_size, 1000);
        assert!(config.query_planner.deduplicate_fetches);
        assert_eq!(config.traffic_shaping.max_connections_per_host, 100);
        assert_eq!(config.traffic_shaping.request_timeout, Duration::from_secs(30));
        assert!(config.override_subgraph_urls.subgraphs.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = parse_yaml_config(
            r#"
            query_planner:
              exposed: true
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn loads_a_config_file() {
        let config = load_config_with_overrides(Some(&fixture_path()), EnvVarOverrides::default())
            .unwrap();

        assert_eq!(config.log.level, LogLevel::Warn);
        assert_eq!(config.log.format, LogFormat::Json);
        assert!(config.query_planner.allow_expose);
        assert_eq!(config.query_planner.timeout, Duration::from_secs(2));
        assert_eq!(config.query_planner.cache_size, 64);
        assert_eq!(
            config.traffic_shaping.request_timeout,
            Duration::from_millis(500)
        );
        assert_eq!(
            config
                .override_subgraph_urls
                .url_map()
                .get("inventory")
                .map(String::as_str),
            Some("http://localhost:4003/graphql")
        );
    }

    #[test]
    fn fused_schema_path_is_relative_to_the_config_file() {
        let config = load_config_with_overrides(Some(&fixture_path()), EnvVarOverrides::default())
            .unwrap();

        let sdl = config.load_fused_schema().unwrap();
        assert!(sdl.contains("@transport"));
    }

    #[test]
    fn env_overrides_win_over_the_file() {
        let overrides = EnvVarOverrides {
            log_level: Some(LogLevel::Trace),
            log_filter: Some("fusion_query_planner=debug".to_string()),
            fused_schema_path: Some("elsewhere.graphql".to_string()),
            ..Default::default()
        };
        let config = load_config_with_overrides(Some(&fixture_path()), overrides).unwrap();

        assert_eq!(config.log.level, LogLevel::Trace);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.env_filter_str(), "fusion_query_planner=debug");
        assert!(config
            .fused_schema_path()
            .ends_with("fixture/elsewhere.graphql"));
    }

    #[test]
    fn missing_fused_schema_reports_the_path() {
        let config = parse_yaml_config(
            r#"
            fused_schema:
              path: does-not-exist.graphql
            "#,
        )
        .unwrap();

        let err = config.load_fused_schema().unwrap_err();
        assert!(err.to_string().contains("does-not-exist.graphql"));
    }
}
