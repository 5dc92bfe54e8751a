use fusion_router_config::log::{LogFormat, LoggingConfig};
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter \"{0}\": {1}")]
    InvalidFilter(String, ParseError),
    #[error("Failed to install the global logger: {0}")]
    InitFailure(#[from] TryInitError),
}

pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    let directive = config.env_filter_str();
    EnvFilter::try_new(directive).map_err(|err| LoggingError::InvalidFilter(directive.to_string(), err))
}

fn build_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let timer = UtcTime::rfc_3339();

    match format {
        LogFormat::PrettyTree => tracing_tree::HierarchicalLayer::new(2)
            .with_bracketed_fields(true)
            .with_deferred_spans(false)
            .with_indent_lines(true)
            .with_timer(tracing_tree::time::Uptime::default())
            .with_targets(false)
            .boxed(),
        LogFormat::Json => fmt::Layer::<Registry>::default()
            .json()
            .with_timer(timer)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::PrettyCompact => fmt::Layer::<Registry>::default()
            .compact()
            .with_timer(timer)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    }
}

/// Installs the global subscriber. Fails when one is already installed.
pub fn configure_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_env_filter(config)?;

    tracing_subscriber::registry()
        .with(build_layer(config.format))
        .with(filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use fusion_router_config::log::{LogFormat, LogLevel, LoggingConfig};

    use super::{build_env_filter, LoggingError};

    #[test]
    fn level_becomes_the_filter() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            filter: None,
        };

        let filter = build_env_filter(&config).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn invalid_filter_is_reported() {
        let config = LoggingConfig {
            level: LogLevel::Info,
            format: LogFormat::PrettyTree,
            filter: Some("fusion_plan_executor=loud".to_string()),
        };

        assert!(matches!(
            build_env_filter(&config),
            Err(LoggingError::InvalidFilter(directive, _)) if directive == "fusion_plan_executor=loud"
        ));
    }
}
