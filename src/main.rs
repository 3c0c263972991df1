//! querygate - read-only SQL gateway for PostgreSQL and MySQL.

use std::sync::Arc;

use querygate::cli::{Action, Cli};
use querygate::config::{Config, ConnectionParameters, DeploymentMode};
use querygate::connection::{ConnectionFactory, SessionManager};
use querygate::db::{Connector, Engine, MockConnector, SqlxConnector};
use querygate::demo::DemoService;
use querygate::error::{GateError, Result};
use querygate::generator::KeywordGenerator;
use querygate::logging;
use querygate::query::QueryExecutor;
use querygate::session::{CredentialStore, SessionId};
use serde::Serialize;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    logging::init_stderr_logging();

    let cli = Cli::parse_args();

    let mut mode = DeploymentMode::default();
    let outcome = match load_config(&cli) {
        Ok(config) => {
            mode = config.runtime.environment;
            run(&cli, &config).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            print_json(&e.to_response(mode));
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides();
    Ok(config)
}

async fn run(cli: &Cli, config: &Config) -> Result<String> {
    let params = resolve_connection(cli, config)?;
    info!("Connection: {}", params.display_string());

    let connector: Arc<dyn Connector> = if cli.mock_db {
        Arc::new(MockConnector::new())
    } else {
        Arc::new(SqlxConnector::from_settings(&config.runtime))
    };
    let executor = QueryExecutor::new(ConnectionFactory::from_settings(
        connector,
        &config.runtime,
    ));

    if let (true, Action::Ask(question)) = (cli.demo, cli.action()) {
        let answer = DemoService::new(executor, params).ask(&question).await?;
        return to_json(&answer);
    }

    let manager = SessionManager::new(
        executor,
        CredentialStore::in_memory(Some(config.runtime.session_ttl())),
    );
    let session = SessionId::generate();
    manager.connect(&session, &params).await?;

    let outcome = match cli.action() {
        Action::Sql(sql) => manager
            .execute(&session, &sql)
            .await
            .and_then(|result| to_json(&result)),
        Action::Ask(question) => manager
            .ask(&session, &KeywordGenerator::new(), &question)
            .await
            .and_then(|answer| to_json(&answer)),
        Action::Schema => manager
            .schema(&session)
            .await
            .and_then(|schema| to_json(&schema)),
        Action::Status => to_json(&manager.status(&session)),
    };

    manager.disconnect(&session);
    outcome
}

/// Resolves connection parameters with precedence:
/// 1. `--demo` (demo database from config and `DEMO_DB_*`)
/// 2. Connection string or individual CLI arguments
/// 3. A placeholder target when `--mock-db` is set
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionParameters> {
    if cli.demo {
        return config.demo.params();
    }

    if let Some(params) = cli.to_connection_parameters(|key| std::env::var(key).ok())? {
        return Ok(params);
    }

    if cli.mock_db {
        return ConnectionParameters::new("mock", 5432, "mock", "", "mock", Engine::Postgres);
    }

    Err(GateError::config(
        "No database connection configured. Use --help for usage information.",
    ))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| GateError::internal(format!("Failed to encode response: {e}")))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to encode response: {e}"),
    }
}
