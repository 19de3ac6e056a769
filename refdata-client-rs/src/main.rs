// refdata-client-rs/src/main.rs
// Command-line entry point: runs one reference-data operation and prints JSON

use std::env;
use std::process::ExitCode;

use anyhow::{bail, Context};
use serde_json::Value;

use refdata_client::telemetry::{init_logging, LoggingConfig};
use refdata_client::{ClientConfig, RefDataClient, ServiceClient};

const USAGE: &str = "usage: refdata-cli <command> [args]

commands:
  search-index <query> [index] [limit]
  search-text <query> [text] [limit]
  entity <id>
  find <name>
  catalog
  health

configuration is read from REFDATA_* environment variables (REFDATA_BASE_URL is required)";

fn parse_limit(arg: Option<&String>) -> anyhow::Result<Option<u32>> {
    arg.map(|s| s.parse::<u32>().with_context(|| format!("invalid limit: {}", s)))
        .transpose()
}

async fn run(client: &RefDataClient, args: &[String]) -> anyhow::Result<Value> {
    let command = args.first().map(String::as_str).unwrap_or("");
    let arg = |i: usize| args.get(i).map(String::as_str);

    let value = match command {
        "search-index" => {
            let query = arg(1).context(USAGE)?;
            let result = client.search_index(query, arg(2), parse_limit(args.get(3))?).await?;
            serde_json::to_value(result)?
        }
        "search-text" => {
            let query = arg(1).context(USAGE)?;
            let result = client.search_text(query, arg(2), parse_limit(args.get(3))?).await?;
            serde_json::to_value(result)?
        }
        "entity" => serde_json::to_value(client.get_entity(arg(1).context(USAGE)?).await?)?,
        "find" => serde_json::to_value(client.find_entity(arg(1).context(USAGE)?).await?)?,
        "catalog" => serde_json::to_value(client.list_catalog().await?)?,
        "health" => serde_json::json!({
            "healthy": client.health_check().await?,
            "metrics": client.metrics(),
        }),
        _ => bail!(USAGE),
    };

    Ok(value)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let logging = LoggingConfig {
        json_format: env::var("REFDATA_LOG_JSON").map(|v| v == "true").unwrap_or(false),
        level: env::var("REFDATA_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        ..LoggingConfig::default()
    };
    if let Err(e) = init_logging(Some(logging)) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let args: Vec<String> = env::args().skip(1).collect();

    let client = match ClientConfig::from_env().and_then(RefDataClient::new) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&client, &args).await;
    client.shutdown();

    match outcome {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            match e.downcast_ref::<refdata_client::ServiceError>() {
                Some(service_error) => eprintln!("error: {}", service_error.public_message()),
                None => eprintln!("{}", e),
            }
            ExitCode::FAILURE
        }
    }
}
