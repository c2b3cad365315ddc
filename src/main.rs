use modratings::config::{Cli, Config, default_config_dir, default_config_path};
use modratings::handler::AppState;
use modratings::service::LikeService;
use modratings::store::build_store;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // With --config, data (the sqlite file) lives next to the config file;
    // otherwise both live in ~/.modratings/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modratings=info"));
    tracing_subscriber::fmt().json().with_env_filter(filter).init();
    tracing::info!("modratings.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let store = build_store(&cfg.store, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %modratings::unpack_error(&e), "failed to setup store");
        std::process::exit(1);
    });

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let app = modratings::app(AppState::new(LikeService::new(store)));

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let cancellation_token = CancellationToken::new();
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
        }
        signal_token.cancel();
    });

    tracing::info!("modratings.svc running on {}", &address);
    let shutdown_token = cancellation_token.clone();
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await
    {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }

    tracing::info!("modratings.svc going off, graceful shutdown complete");
}
