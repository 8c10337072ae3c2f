mod sweep;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use farepool_api::auth::{self, AppState, AppStateInner};
use farepool_api::chat::ChatMirror;
use farepool_api::middleware::require_auth;
use farepool_api::recommend::RankClient;
use farepool_api::{bills, groups, locations, members, posts, recommend, reports, users};
use farepool_types::models::BillShareBasis;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farepool=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("FAREPOOL_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: FAREPOOL_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path = std::env::var("FAREPOOL_DB_PATH").unwrap_or_else(|_| "farepool.db".into());
    let host = std::env::var("FAREPOOL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("FAREPOOL_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;
    let ranker_url =
        std::env::var("FAREPOOL_RANKER_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".into());
    let chat_url = std::env::var("FAREPOOL_CHAT_URL").ok();
    let sweep_interval_secs: u64 = std::env::var("FAREPOOL_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    let bill_share = std::env::var("FAREPOOL_BILL_SHARE_BASIS")
        .ok()
        .map(|v| {
            BillShareBasis::parse(&v)
                .ok_or_else(|| anyhow::anyhow!("invalid FAREPOOL_BILL_SHARE_BASIS: {v}"))
        })
        .transpose()?
        .unwrap_or_default();

    // Init database
    let db = farepool_db::Database::open(&PathBuf::from(&db_path))?;

    if chat_url.is_none() {
        info!("FAREPOOL_CHAT_URL unset, chat mirror disabled");
    }

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        chat: ChatMirror::new(chat_url)?,
        ranker: RankClient::new(ranker_url)?,
        bill_share,
    });

    // Background expiry sweep
    tokio::spawn(sweep::run_sweep_loop(state.clone(), sweep_interval_secs));

    // Routes
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/users", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/users/check-username", get(users::check_username))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/users/{id}", patch(users::update_user))
        .route("/api/users/{id}", delete(users::delete_user))
        .route("/api/users/{id}/weights", patch(users::update_weights))
        .route("/api/users/{id}/reports", get(reports::reports_against_user))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/available", get(posts::available_posts))
        .route("/api/posts/by-ids", post(posts::posts_by_ids))
        .route("/api/posts/{id}", get(posts::get_post))
        .route("/api/groups", post(groups::create_group))
        .route("/api/groups", get(groups::list_groups))
        .route("/api/groups/my", get(groups::my_groups))
        .route("/api/groups/post/{post_id}", get(groups::group_by_post))
        .route("/api/groups/{id}", get(groups::get_group))
        .route("/api/group-members", post(members::join_group))
        .route("/api/group-members/my", get(members::my_memberships))
        .route(
            "/api/group-members/groups/{group_id}",
            get(members::members_of_group),
        )
        .route("/api/group-members/{group_id}/is-host", get(members::is_host))
        .route("/api/group-members/{group_id}", delete(members::leave_group))
        .route(
            "/api/group-members/{group_id}/{user_id}",
            get(members::get_member),
        )
        .route(
            "/api/group-members/{group_id}/{user_id}",
            delete(members::remove_member),
        )
        .route("/api/bills", post(bills::create_bill))
        .route("/api/bills", get(bills::list_bills))
        .route("/api/bills/{id}", get(bills::get_bill))
        .route("/api/bills/{id}", patch(bills::update_bill))
        .route("/api/bills/{id}/status", patch(bills::update_bill_status))
        .route("/api/bills/{id}", delete(bills::delete_bill))
        .route("/api/recommend", get(recommend::recommend))
        .route("/api/recommend/route", post(recommend::recommend_route))
        .route("/api/recommend/stats", get(recommend::recommend_stats))
        .route("/api/locations", post(locations::create_location))
        .route("/api/locations/{id}", get(locations::get_location))
        .route("/api/reports", post(reports::create_report))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Farepool server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
