use std::{env, process, sync::Arc};

use executor::{
    executors::{
        error::SubgraphExecutorError,
        map::{HttpExecutorOptions, SubgraphExecutorMap},
    },
    execute_query_plan, execute_subscription,
    response::graphql_error::GraphQLError,
    variables::coerce_variables,
    ExecutionOptions, ExecutionResponse, QueryPlanExecution, SubscriptionExecution,
};
use futures::StreamExt;
use fusion_router_config::{load_config, FusionRouterConfig, RouterConfigError};
use fusion_router_internal::logging::{configure_logging, LoggingError};
use query_planner::{
    planner::error::PlannerError,
    schema::error::SchemaError,
    utils::{cancellation::CancellationToken, parsing::safe_parse_operation},
    FusedSchema, Planner, PlannerOptions,
};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("Unable to read \"{0}\": {1}")]
    ReadFailure(String, std::io::Error),
    #[error(transparent)]
    Config(#[from] RouterConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Executors(#[from] SubgraphExecutorError),
    #[error("Invalid --variables: {0}")]
    InvalidVariables(String),
    #[error(transparent)]
    Output(#[from] serde_json::Error),
    #[error("Failed to start the async runtime: {0}")]
    Runtime(std::io::Error),
}

const USAGE: &str = "Usage: fusion-dev-cli <normalize|plan|execute> [<fused_schema_path>] <operation_path> [--json] [--variables <json>] [--config <path>]";

struct CliArgs {
    command: String,
    /// Falls back to the config's `fused_schema.path` when omitted.
    schema_path: Option<String>,
    operation_path: String,
    json: bool,
    variables: Option<String>,
    config_path: Option<String>,
}

impl CliArgs {
    fn parse(args: Vec<String>) -> Result<Self, CliError> {
        let mut positional = Vec::new();
        let mut json = false;
        let mut variables = None;
        let mut config_path = None;

        let mut args = args.into_iter().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => json = true,
                "--variables" => variables = Some(flag_value(&mut args, "--variables")?),
                "--config" => config_path = Some(flag_value(&mut args, "--config")?),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (command, schema_path, operation_path) =
            match (positional.next(), positional.next(), positional.next(), positional.next()) {
                (Some(command), Some(operation_path), None, None) => (command, None, operation_path),
                (Some(command), Some(schema_path), Some(operation_path), None) => {
                    (command, Some(schema_path), operation_path)
                }
                _ => return Err(CliError::Usage(USAGE.to_string())),
            };

        Ok(CliArgs {
            command,
            schema_path,
            operation_path,
            json,
            variables,
            config_path,
        })
    }
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
    args.next()
        .ok_or_else(|| CliError::Usage(format!("{} expects a value\n{}", flag, USAGE)))
}

fn read_file(path: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|err| CliError::ReadFailure(path.to_string(), err))
}

fn main() {
    let result = CliArgs::parse(env::args().collect()).and_then(run);

    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<(), CliError> {
    let config = load_config(args.config_path.as_deref())?;
    configure_logging(&config.log)?;

    let schema = Arc::new(load_schema(args.schema_path.as_deref(), &config)?);
    let planner = Planner::with_cache_size(
        schema.clone(),
        PlannerOptions {
            deduplicate_fetches: config.query_planner.deduplicate_fetches,
        },
        config.query_planner.cache_size,
    );
    let document = read_file(&args.operation_path)?;
    let cancellation = CancellationToken::with_timeout(config.query_planner.timeout);

    match args.command.as_str() {
        "normalize" => {
            let parsed = safe_parse_operation(&document)
                .map_err(|err| PlannerError::ParseError(err.to_string()))?;
            println!("{}", planner.normalize(&parsed, None)?);
        }
        "plan" => {
            let (_, plan) = planner.plan_source(&document, None, &cancellation)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&*plan)?);
            } else {
                println!("{}", plan);
            }
        }
        "execute" => {
            let variables = parse_variables(args.variables.as_deref())?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(CliError::Runtime)?;

            runtime.block_on(execute(&config, schema, &planner, &document, variables, &cancellation))?;
        }
        other => {
            return Err(CliError::Usage(format!(
                "Unknown command \"{}\". Available commands: normalize, plan, execute",
                other
            )))
        }
    }

    Ok(())
}

fn load_schema(
    schema_path: Option<&str>,
    config: &FusionRouterConfig,
) -> Result<FusedSchema, CliError> {
    let source = match schema_path {
        Some(path) => read_file(path)?,
        None => {
            debug!(path = %config.fused_schema_path().display(), "loading fused schema from config");
            config.load_fused_schema()?
        }
    };

    Ok(FusedSchema::parse(&source)?)
}

fn parse_variables(raw: Option<&str>) -> Result<Option<Map<String, Value>>, CliError> {
    match raw.map(serde_json::from_str::<Value>) {
        None => Ok(None),
        Some(Ok(Value::Object(map))) => Ok(Some(map)),
        Some(Ok(_)) => Err(CliError::InvalidVariables("expected a JSON object".to_string())),
        Some(Err(err)) => Err(CliError::InvalidVariables(err.to_string())),
    }
}

async fn execute(
    config: &FusionRouterConfig,
    schema: Arc<FusedSchema>,
    planner: &Planner,
    document: &str,
    variables: Option<Map<String, Value>>,
    cancellation: &CancellationToken,
) -> Result<(), CliError> {
    let (operation, plan) = match planner.plan_source(document, None, cancellation) {
        Ok(planned) => planned,
        Err(err) => return print_response(&ExecutionResponse::plan_failure(err.to_string())),
    };

    let variables = match coerce_variables(&operation, variables.as_ref()) {
        Ok(variables) => variables,
        Err(err) => {
            return print_response(&ExecutionResponse::from_error(GraphQLError::from(
                err.to_string(),
            )))
        }
    };

    let traffic_shaping = &config.traffic_shaping;
    let executors = SubgraphExecutorMap::from_http_endpoint_map(
        schema.subgraph_endpoints(),
        &config.override_subgraph_urls.url_map(),
        &HttpExecutorOptions {
            max_connections_per_host: traffic_shaping.max_connections_per_host,
            pool_idle_timeout: std::time::Duration::from_secs(
                traffic_shaping.pool_idle_timeout_seconds,
            ),
            request_timeout: traffic_shaping.request_timeout,
        },
    )?;
    let options = ExecutionOptions {
        expose_query_plan: config.query_planner.allow_expose,
        error_filter: None,
    };
    let token = tokio_util::sync::CancellationToken::new();
    debug!(kind = %operation.kind, "executing operation");

    if plan.subscription.is_some() {
        let mut responses = execute_subscription(SubscriptionExecution {
            schema,
            operation: Arc::new(operation),
            query_plan: plan,
            variables: Arc::new(variables),
            executors: Arc::new(executors),
            options,
            cancellation_token: token,
        })
        .await;

        while let Some(response) = responses.next().await {
            print_response(&response)?;
        }

        return Ok(());
    }

    let response = execute_query_plan(QueryPlanExecution {
        schema: &schema,
        operation: &operation,
        query_plan: &plan,
        variables: &variables,
        executors: &executors,
        options: &options,
        cancellation_token: &token,
    })
    .await;

    print_response(&response)
}

fn print_response(response: &ExecutionResponse) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use fusion_router_config::{load_config_with_overrides, EnvVarOverrides};

    use super::{load_schema, CliArgs, CliError};

    fn parse(args: &[&str]) -> Result<CliArgs, CliError> {
        let mut argv = vec!["fusion-dev-cli".to_string()];
        argv.extend(args.iter().map(|arg| arg.to_string()));
        CliArgs::parse(argv)
    }

    #[test]
    fn schema_path_is_optional() {
        let args = parse(&["plan", "query.graphql", "--config", "router.yaml"]).unwrap();
        assert_eq!(args.command, "plan");
        assert_eq!(args.schema_path, None);
        assert_eq!(args.operation_path, "query.graphql");
        assert_eq!(args.config_path.as_deref(), Some("router.yaml"));
    }

    #[test]
    fn explicit_schema_path_wins() {
        let args = parse(&["execute", "fused.graphql", "query.graphql", "--json"]).unwrap();
        assert_eq!(args.schema_path.as_deref(), Some("fused.graphql"));
        assert_eq!(args.operation_path, "query.graphql");
        assert!(args.json);
    }

    #[test]
    fn wrong_positional_count_is_a_usage_error() {
        assert!(matches!(parse(&["plan"]), Err(CliError::Usage(_))));
        assert!(matches!(
            parse(&["plan", "a", "b", "c"]),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn schema_falls_back_to_the_config() {
        let config = load_config_with_overrides(
            Some("../../lib/router-config/fixture/router.config.yaml"),
            EnvVarOverrides::default(),
        )
        .unwrap();

        let schema = load_schema(None, &config).unwrap();
        assert!(schema.subgraph_endpoints().contains_key("products"));
    }
}
