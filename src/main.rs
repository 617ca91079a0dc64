//! Gemini API Gateway
//!
//! This application accepts prompt requests over HTTP and forwards them to
//! the Google Gemini `generateContent` API, relaying the generated text back
//! to the caller.

mod api;
mod core;
mod models;

use crate::api::endpoints::{AppState, create_router};
use crate::core::config::{Config, Environment};
use crate::core::logging::init_logging;
use crate::core::provider::Provider;
use crate::core::providers::GeminiProvider;
use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Check for --help flag
    if std::env::args().any(|arg| arg == "--help") {
        print_help();
        return;
    }

    // Load configuration before anything can accept connections
    let config = match Config::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Configuration Error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level, config.environment);

    print_startup_banner(&config);

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Arc<Config>) -> anyhow::Result<()> {
    let provider: Arc<dyn Provider> =
        Arc::new(GeminiProvider::from_config(&config).context("Failed to create Gemini provider")?);

    info!("Using provider: {}", provider.provider_name());

    let app_state = AppState {
        config: config.clone(),
        provider,
    };

    let app = apply_cors(create_router(app_state), config.environment);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Development allows any origin; production relies on same-origin callers.
fn apply_cors(router: Router, environment: Environment) -> Router {
    match environment {
        Environment::Development => router.layer(CorsLayer::permissive()),
        Environment::Production => router,
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    println!("🚀 Gemini Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!("✅ Configuration loaded successfully");
    println!("   Environment: {}", config.environment.as_str());
    println!("   Debug: {}", config.debug);
    println!("   Base URL: {}", config.base_url);
    println!("   Model: {}", config.model);
    println!("   Request Timeout: {}s", config.request_timeout);
    println!("   Max Prompt Length: {} chars", config.max_prompt_chars);
    println!("   Server: {}:{}", config.host, config.port);
    println!(
        "   CORS: {}",
        if config.environment.is_production() {
            "Disabled"
        } else {
            "Any origin"
        }
    );
    println!();
}

/// Print help message
fn print_help() {
    println!("Gemini Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: gemini-gateway [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help    Display this help message");
    println!();
    println!("Environment variables (a .env file is loaded if present):");
    println!("  GEMINI_API_KEY - Gemini API key (required)");
    println!("  PYTHON_ENV - development or production (default: development)");
    println!("  DEBUG - Verbose diagnostic logging: true or false (default: false)");
    println!("  HOST - Server host (default: 0.0.0.0)");
    println!("  PORT - Server port (default: 8000)");
    println!("  LOG_LEVEL - Logging level (default: info)");
    println!("  REQUEST_TIMEOUT - Upstream timeout in seconds (default: 30)");
    println!("  GEMINI_BASE_URL - Gemini REST base URL");
    println!("  GEMINI_MODEL - Model name (default: gemini-1.5-flash)");
    println!("  MAX_PROMPT_CHARS - Longest accepted prompt (default: 32000)");
    println!("  CONFIG_PATH - Optional TOML file with [server], [upstream], [generation]");
    println!();
    println!("Endpoints:");
    println!("  POST /api/generate  {{\"prompt\": \"...\", \"context\": \"...\"}}");
    println!("  GET  /api/health");
}
