mod cli;
mod server;

use std::sync::Arc;

use clap::Parser;
use eyre::WrapErr;

use publabels_core::{Registry, RegistryConfig};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Generate a random API token for this server session.
    let api_token = {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        hex::encode(bytes)
    };

    let config = RegistryConfig {
        verifiers_review: args.verifiers_review,
    };
    let registry = match &args.journal {
        Some(path) => {
            let registry = Registry::open(path, args.admin, config)
                .wrap_err_with(|| format!("open registry journal {}", path.display()))?;
            tracing::info!(path = %path.display(), "registry journal attached");
            registry
        }
        None => {
            tracing::warn!("no --journal given; registry state is lost on exit");
            Registry::with_config(args.admin, config)
        }
    };
    tracing::info!(
        admin = %args.admin,
        verifiers_review = args.verifiers_review,
        changes = registry.change_count(),
        entries = registry.entry_count(),
        "registry ready"
    );

    if args.max_page_size > server::limits::HARD_MAX_PAGE_SIZE {
        tracing::warn!(
            requested = args.max_page_size,
            ceiling = server::limits::HARD_MAX_PAGE_SIZE,
            "--max-page-size exceeds the hard ceiling and will be clamped"
        );
    }

    let state = server::AppState {
        registry: Arc::new(tokio::sync::RwLock::new(registry)),
        api_token: api_token.clone(),
        max_page_size: args.max_page_size,
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin)?;

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and is reachable from the network");
    }

    println!();
    println!("  publabels is running:");
    println!("    URL:       http://{bind_addr}");
    println!("    API token: {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .wrap_err("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("run HTTP server")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
