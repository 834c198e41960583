use std::sync::Arc;

use athenaeum::assets::serve_embedded;
use athenaeum::auth;
use athenaeum::circulation::{self, Circulation};
use athenaeum::config::{Cli, Config, default_config_dir, default_config_path};
use athenaeum::db::Database;
use athenaeum::handler::{
    AppState, create_author, create_book, create_category, delete_book, get_book, get_books,
    get_metadata, healthcheck, search_books, update_book,
};
use athenaeum::members;
use athenaeum::pages;
use axum::http::Method;
use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    // Determine config path and data directory
    // If --config is provided, use its parent directory for data (database, etc.)
    // Otherwise use ~/.athenaeum/ for both
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => {
            let dir = default_config_dir();
            (default_config_path(), dir)
        }
    };

    // Ensure data directory exists
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt().json().init();
    tracing::info!("athenaeum.svc starting");

    let cfg = Config::new(config_path.to_str().unwrap()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Arc::new(Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));

    if let Err(e) = auth::bootstrap_admin(&db, &cfg.auth).await {
        tracing::error!(error = %e, "failed to bootstrap admin user");
        std::process::exit(1);
    }

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

    // Background maintenance: suspend members with overdue loans and drop
    // expired sessions.
    let sweep_db = db.clone();
    let sweep_token = cancellation_token.clone();
    let sweep_interval = cfg.app.sweep_interval_seconds;
    let sweep_done = shutdown_complete_tx.clone();
    tokio::spawn(async move {
        let _done = sweep_done;
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let circulation = Circulation::new(&sweep_db);
                    match circulation.sweep_overdue(circulation::today()).await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!(suspended = n, "overdue sweep suspended members"),
                        Err(e) => tracing::warn!("overdue sweep failed: {}", e),
                    }

                    let accounts = auth::Accounts::new(sweep_db.connection());
                    match accounts.cleanup_expired_sessions().await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!(removed = n, "cleaned up expired sessions"),
                        Err(e) => tracing::warn!("session cleanup failed: {}", e),
                    }
                }
                _ = sweep_token.cancelled() => {
                    tracing::info!("maintenance task shutting down");
                    break;
                }
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let state = AppState {
        db,
        auth: Arc::new(cfg.auth.clone()),
    };

    let public = Router::new()
        .route("/healthz", get(healthcheck))
        .route("/assets/*file", get(serve_embedded))
        .merge(pages::public_routes())
        .nest("/api/auth", auth::public_routes());

    let protected = Router::new()
        .merge(pages::routes())
        .route("/api/books", get(get_books).post(create_book))
        .route("/api/books/search", get(search_books))
        .route(
            "/api/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/api/metadata", get(get_metadata))
        .route("/api/authors", post(create_author))
        .route("/api/categories", post(create_category))
        .nest("/api/auth", auth::routes())
        .nest("/api/members", members::routes())
        .nest("/api/circulation", circulation::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("athenaeum.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            cancellation_token.cancel();
        }
    }

    drop(shutdown_complete_tx);
    shutdown_complete_rx.recv().await;
    tracing::info!("athenaeum.svc going off, graceful shutdown complete");
}
