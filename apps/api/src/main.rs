mod ai_client;
mod auth;
mod config;
mod db;
mod device;
mod documents;
mod errors;
mod events;
mod heartbeat;
mod interview;
mod models;
mod push;
mod report;
mod resume;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_client::{AiClient, AiService};
use crate::config::Config;
use crate::db::create_pool;
use crate::device::repository::PgDeviceRepository;
use crate::device::service::DeviceService;
use crate::device::signature::DeviceAuth;
use crate::documents::DocumentService;
use crate::events::dispatch::Dispatcher;
use crate::events::pool::WorkerPool;
use crate::events::EventBus;
use crate::heartbeat::repository::PgHeartbeatRepository;
use crate::heartbeat::service::HeartbeatService;
use crate::interview::reply::ReplyService;
use crate::interview::repository::PgInterviewRepository;
use crate::interview::session::SessionService;
use crate::interview::state::InterviewStatus;
use crate::interview::workflow::ResumeWorkflow;
use crate::push::fcm::FcmGateway;
use crate::push::{HealthDataPush, LoggingPushGateway, PushGateway};
use crate::report::repository::PgReportRepository;
use crate::report::service::ReportService;
use crate::resume::repository::PgResumeRepository;
use crate::resume::service::ResumeService;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::redis_kv::RedisStore;
use crate::storage::s3::S3ObjectStore;
use crate::storage::{KeyValueStore, Ticketing};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MindStage API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let interviews = Arc::new(PgInterviewRepository::new(db.clone()));
    let resumes = Arc::new(PgResumeRepository::new(db.clone()));
    let report_rows = Arc::new(PgReportRepository::new(db.clone()));
    let heartbeat_rows = Arc::new(PgHeartbeatRepository::new(db.clone()));
    let watches = Arc::new(PgDeviceRepository::new(db));

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let kv: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&redis).await?);
    info!("Redis connection established");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let tickets = Ticketing::new(
        Arc::new(S3ObjectStore::new(s3, config.s3_bucket.clone())),
        kv.clone(),
    );
    info!(bucket = %config.s3_bucket, "S3 client initialized");

    // Initialize AI client
    let ai: Arc<dyn AiService> = Arc::new(AiClient::new(config.ai_base_url.clone())?);
    info!(base_url = %config.ai_base_url, "AI client initialized");

    // Initialize push delivery
    let gateway: Arc<dyn PushGateway> = match &config.fcm {
        Some(fcm) => {
            info!(project = %fcm.project_id, "FCM push enabled");
            Arc::new(FcmGateway::new(fcm)?)
        }
        None => {
            warn!("FCM not configured, push messages are logged only");
            Arc::new(LoggingPushGateway)
        }
    };
    let push = HealthDataPush::new(gateway, kv.clone());

    // Services
    let (bus, events) = EventBus::channel();
    let status = InterviewStatus::new(interviews.clone());
    let heartbeats = HeartbeatService::new(heartbeat_rows, interviews.clone());
    let reports = ReportService::new(
        report_rows,
        interviews.clone(),
        status.clone(),
        heartbeats.clone(),
    );
    let device_auth = DeviceAuth::new(kv);

    // Background work: question generation and report scoring
    let pool = WorkerPool::start("background", config.worker_pool);
    let workflow = ResumeWorkflow::new(
        resumes.clone(),
        interviews.clone(),
        status.clone(),
        reports.clone(),
        tickets.clone(),
        ai.clone(),
        bus.clone(),
    );
    Dispatcher::new(tickets.clone(), workflow, reports.clone(), pool).spawn(events);
    info!(
        core = config.worker_pool.core_workers,
        max = config.worker_pool.max_workers,
        queue = config.worker_pool.queue_capacity,
        "Event dispatcher started"
    );

    // Build app state
    let state = AppState {
        resumes: ResumeService::new(resumes.clone(), bus.clone()),
        sessions: SessionService::new(
            interviews.clone(),
            resumes.clone(),
            status,
            reports.clone(),
            tickets.clone(),
            ai.clone(),
            push.clone(),
            bus.clone(),
        ),
        replies: ReplyService::new(interviews, resumes, tickets.clone(), ai.clone(), bus.clone()),
        reports,
        heartbeats,
        devices: DeviceService::new(watches, device_auth.clone(), push),
        documents: DocumentService::new(tickets, ai, bus),
        device_auth,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "mindstage-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets under the path, not a subdomain.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
