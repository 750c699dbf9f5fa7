//! Edge Gateway - authenticating reverse proxy
//!
//! Validates bearer tokens against the identity provider's key set and
//! forwards verified requests to backend services by path.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use edge_gateway::{
    Error,
    auth::{KeySource, TokenValidator, extract_bearer},
    cli::{Cli, Command},
    config::Config,
    gateway::{Gateway, ProcessEnv, RouteTable},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Routes) => run_routes(&cli),
        Some(Command::Verify { ref token }) => run_verify(&cli, token).await,
        Some(Command::Serve) | None => run_server(&cli).await,
    }
}

fn load_config(cli: &Cli) -> Option<Config> {
    match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            // Apply CLI overrides
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            Some(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            None
        }
    }
}

fn report_startup_error(e: &Error) {
    if e.is_configuration() {
        error!("Invalid configuration: {e}");
    } else {
        error!("Failed to start gateway: {e}");
    }
}

/// Run the gateway server
async fn run_server(cli: &Cli) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        routes = config.routing.routes.len(),
        "Starting Edge Gateway"
    );

    let gateway = match Gateway::new(config).await {
        Ok(g) => g,
        Err(e) => {
            report_startup_error(&e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the route table
fn run_routes(cli: &Cli) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };

    let table = match RouteTable::from_config(&config.routing) {
        Ok(table) => table,
        Err(e) => {
            report_startup_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let env = ProcessEnv;
    println!("{} route(s):\n", table.len());
    for route in table.iter() {
        let methods = route.methods.iter().map(ToString::to_string).collect::<Vec<_>>();
        let origin = route.origin.resolve(&env);
        println!("  {}  [{}]", route.path, methods.join(", "));
        println!("    service: {}", route.service);
        println!(
            "    origin:  {} -> {}",
            route.origin,
            if origin.is_empty() { "(not configured)" } else { origin.as_str() }
        );
    }
    if config.routing.strict_methods {
        println!("\nDisallowed methods answer 405 Method Not Allowed");
    }

    ExitCode::SUCCESS
}

/// Validate one token and print its claims
async fn run_verify(cli: &Cli, token: &str) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };
    if let Err(e) = config.validate() {
        report_startup_error(&e);
        return ExitCode::FAILURE;
    }

    let keys = match KeySource::initialize(&config.auth.key_source()).await {
        Ok(keys) => Arc::new(keys),
        Err(e) => {
            report_startup_error(&Error::from(e));
            return ExitCode::FAILURE;
        }
    };
    let validator = TokenValidator::new(keys, config.auth.validator());

    // Accept the raw token or a full header value
    let token = if token.split_whitespace().count() == 2 {
        match extract_bearer(token) {
            Ok(token) => token,
            Err(e) => {
                eprintln!("Token rejected: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        token.trim()
    };

    match validator.validate(token).await {
        Ok(claims) => match serde_json::to_string_pretty(&claims) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize claims: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Token rejected: {e}");
            ExitCode::FAILURE
        }
    }
}
