use std::env;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, State, connect_info::ConnectInfo},
    http::{
        Method, Request,
        header::{CONTENT_TYPE, HeaderName, HeaderValue},
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use chrono::NaiveDate;
use clap::Parser;
use dotenvy::dotenv;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
};
use tm_common::{
    brief::{BriefCatalog, BriefResolver, ResolvedBrief},
    db::{self, PgPool},
    logging::{init_tracing_subscriber, install_tracing_panic_hook},
    matching::{MatchingEngine, MatchingEngineConfig},
    repository::ReferenceSnapshot,
    run_id,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

pub mod error;
pub mod handlers;

use error::ApiError;
use handlers::{briefs, health, matches};

const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_millis(200);
const DB_PING_TIMEOUT: Duration = Duration::from_secs(1);
const BODY_LIMIT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "tm-api", about = "HTTP API for talent recommendation matching")]
struct Cli {
    /// PostgreSQL connection string for reference data
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JSON reference snapshot, used when DATABASE_URL is not set
    #[arg(long, env = "TM_REFERENCE_SNAPSHOT")]
    reference_snapshot: Option<PathBuf>,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = 3002)]
    port: u16,

    /// Comma separated list of allowed CORS origins
    #[arg(long, env = "TM_CORS_ORIGINS", default_value = "http://localhost:3000")]
    cors_origins: String,
}

/// Where reference data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceConfig {
    Postgres(String),
    Snapshot(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reference: ReferenceConfig,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    fn from_cli(cli: Cli) -> Result<Self, ApiError> {
        let cors_origins = cli
            .cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();

        if cors_origins.iter().any(|origin| origin == "*") {
            return Err(ApiError::BadRequest(
                "TM_CORS_ORIGINS must list explicit origins".into(),
            ));
        }

        let reference = match (cli.database_url, cli.reference_snapshot) {
            (Some(url), _) => ReferenceConfig::Postgres(url),
            (None, Some(path)) => ReferenceConfig::Snapshot(path),
            (None, None) => {
                return Err(ApiError::BadRequest(
                    "either DATABASE_URL or TM_REFERENCE_SNAPSHOT is required".into(),
                ));
            }
        };

        Ok(Self {
            reference,
            port: cli.port,
            cors_origins,
        })
    }

    pub fn for_tests() -> Self {
        Self {
            reference: ReferenceConfig::Snapshot(PathBuf::from("snapshot.json")),
            port: 3002,
            cors_origins: vec!["http://localhost:3000".into()],
        }
    }
}

/// Reference data backing the matching endpoint.
pub enum ReferenceSource {
    /// Each request loads the slice it needs.
    Postgres(PgPool),
    /// Fixed data loaded once at startup.
    Snapshot(Arc<ReferenceSnapshot>),
}

impl ReferenceSource {
    pub async fn load(
        &self,
        brief: &ResolvedBrief,
        today: NaiveDate,
    ) -> Result<Arc<ReferenceSnapshot>, ApiError> {
        match self {
            ReferenceSource::Postgres(pool) => {
                let snapshot = db::load_reference_snapshot(pool, brief, today).await?;
                Ok(Arc::new(snapshot))
            }
            ReferenceSource::Snapshot(snapshot) => Ok(Arc::clone(snapshot)),
        }
    }

    pub async fn check_ready(&self) -> Result<&'static str, ApiError> {
        match self {
            ReferenceSource::Postgres(pool) => {
                db::ping(pool, DB_PING_TIMEOUT)
                    .await
                    .map_err(|err| ApiError::ServiceUnavailable(format!("database not ready: {err}")))?;
                Ok("postgres")
            }
            ReferenceSource::Snapshot(_) => Ok("snapshot"),
        }
    }
}

type IpRateLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_sec: u32,
    pub burst: u32,
}

impl RateLimitConfig {
    fn parse_env_u32(name: &str) -> Option<u32> {
        env::var(name)
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
    }

    fn from_env() -> Self {
        Self {
            per_sec: Self::parse_env_u32("TM_RATE_LIMIT_PER_SEC").unwrap_or(20),
            burst: Self::parse_env_u32("TM_RATE_LIMIT_BURST").unwrap_or(40),
        }
    }
}

fn build_ip_limiter(cfg: &RateLimitConfig) -> Arc<IpRateLimiter> {
    let per_sec = NonZeroU32::new(cfg.per_sec).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(cfg.burst).unwrap_or(per_sec);
    Arc::new(RateLimiter::keyed(Quota::per_second(per_sec).allow_burst(burst)))
}

pub struct AppState {
    pub reference: ReferenceSource,
    pub resolver: BriefResolver,
    pub engine: MatchingEngine,
    pub config: AppConfig,
    rate_limiter: Arc<IpRateLimiter>,
    pub readiness: AtomicBool,
}

pub type SharedState = Arc<AppState>;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

fn request_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

async fn rate_limit(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(client_ip) = request_ip(&req) {
        if state.rate_limiter.check_key(&client_ip).is_err() {
            return Err(ApiError::TooManyRequests("rate limit exceeded".into()));
        }
    }
    Ok(next.run(req).await)
}

async fn attach_request_id_context(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    error::with_request_id(request_id, next.run(req)).await
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_header = request_id_header.clone();

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&trace_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let api_routes = Router::new()
        .route("/matches", post(matches::run_match))
        .route("/briefs/options", get(briefs::options));

    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn(attach_request_id_context))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid::default(),
        ))
        .layer(cors)
        .with_state(state)
}

/// State over an in-memory snapshot with jitter disabled.
pub fn test_state(snapshot: ReferenceSnapshot) -> SharedState {
    Arc::new(AppState {
        reference: ReferenceSource::Snapshot(Arc::new(snapshot)),
        resolver: BriefResolver::builtin(),
        engine: MatchingEngine::new(MatchingEngineConfig {
            jitter: tm_common::matching::JitterMode::Disabled,
            ..MatchingEngineConfig::default()
        }),
        config: AppConfig::for_tests(),
        rate_limiter: build_ip_limiter(&RateLimitConfig::from_env()),
        readiness: AtomicBool::new(true),
    })
}

async fn build_reference_source(config: &ReferenceConfig) -> Result<ReferenceSource, ApiError> {
    match config {
        ReferenceConfig::Postgres(url) => {
            let pool = db::create_pool_from_url(url)
                .map_err(|err| ApiError::Internal(format!("failed to create pool: {err}")))?;
            Ok(ReferenceSource::Postgres(pool))
        }
        ReferenceConfig::Snapshot(path) => {
            let snapshot = ReferenceSnapshot::from_json_file(path)
                .map_err(|err| ApiError::Internal(format!("failed to load reference snapshot: {err}")))?;
            info!(
                candidates = snapshot.data().candidates.len(),
                "loaded reference snapshot"
            );
            Ok(ReferenceSource::Snapshot(Arc::new(snapshot)))
        }
    }
}

pub async fn run() -> Result<(), ApiError> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli)?;

    let catalog = BriefCatalog::from_env_or_builtin()
        .map_err(|err| ApiError::Internal(format!("failed to load brief catalog: {err}")))?;
    let reference = build_reference_source(&config.reference).await?;
    let engine = MatchingEngine::from_env();

    tm_metrics::init_metrics("TM_METRICS_PORT", 9102);

    let state = Arc::new(AppState {
        reference,
        resolver: BriefResolver::new(catalog),
        engine,
        config: config.clone(),
        rate_limiter: build_ip_limiter(&RateLimitConfig::from_env()),
        readiness: AtomicBool::new(true),
    });

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let app = create_router(state.clone());

    info!(
        %addr,
        instance = run_id::instance(),
        result_limit = state.engine.config().result_limit,
        jitter = ?state.engine.config().jitter,
        "tm-api listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state.readiness.store(false, Ordering::SeqCst);
    info!("shutdown requested; draining");

    // /readyz reports not-ready during this window
    tokio::time::sleep(SHUTDOWN_DRAIN_GRACE).await;
}
