use fusion_router_config::FusionRouterConfig;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(FusionRouterConfig);

    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("Failed to serialize the configuration schema: {}", err);
            std::process::exit(1);
        }
    }
}
