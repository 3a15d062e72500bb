use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::Value;
use token_gateway::errors::safe_error_message;
use token_gateway::gateway::Gateway;
use token_gateway::server;
use token_gateway::utils::config_loader;
use token_gateway::utils::logging::{self, LogLevel};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-gateway.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve health, readiness and metrics endpoints
    Serve,
    /// Force a credential refresh and print the cache status
    Refresh,
    /// Execute one request against an upstream and print the JSON response
    Request {
        /// upstream name from the config file
        #[arg(short, long)]
        upstream: String,
        /// HTTP method, e.g. GET
        method: String,
        /// root-relative endpoint path, e.g. /v1/pages?slug=a
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// print response headers before the body
        #[arg(long)]
        include_headers: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Read args, load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Build credential cache and upstream executors
    // -------------------------------

    let gateway = Gateway::from_config(&service_config).map_err(|err| anyhow!("{}", err))?;

    // -------------------------------
    // 3. Cancel in-flight work on Ctrl-C
    // -------------------------------

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.cancel();
            }
        }
    });

    // -------------------------------
    // 4. Run the command
    // -------------------------------

    match args.command {
        Command::Serve => {
            info!("Service starting...");
            let served = server::server::start(&service_config.settings, gateway.cache().clone(), shutdown).await;
            gateway.cache().shutdown();
            served
        }
        Command::Refresh => {
            if let Err(err) = gateway.cache().force_refresh(&shutdown).await {
                debug!(error = %err, "credential refresh failed");
                bail!("{}", safe_error_message(&err.into()));
            }
            let status = gateway.cache().status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Request {
            upstream,
            method,
            path,
            body,
            include_headers,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method '{method}'"))?;
            let body: Option<Value> = body
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("--body is not valid JSON")?;

            let executor = gateway.executor(&upstream).map_err(|err| anyhow!("{}", err))?;
            let response = match executor
                .execute::<Value, Value>(&shutdown, method, &path, body.as_ref())
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    debug!(error = %err, "request failed");
                    bail!("{}", safe_error_message(&err.into()));
                }
            };

            if include_headers {
                for (name, value) in &response.headers {
                    println!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
                }
                println!();
            }
            if let Some(body) = response.body {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Ok(())
        }
    }
}
