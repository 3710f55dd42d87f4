use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strive_api::{app, state::{AppState, AuthConfig}};
use strive_booking::{BookingEngine, EngineConfig};
use strive_catalog::{CapacityStore, ClassRepository};
use strive_core::{LogNotifier, MockPaymentGateway, SystemClock};
use strive_ledger::CreditLedger;
use strive_store::{DbClient, EventProducer, PgBookingRepository, PgClassRepository, RedisClient};
use strive_waitlist::WaitlistQueue;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strive_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = strive_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Strive API on port {}", config.server.port);

    // Postgres connection
    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.ensure_schema().await.expect("Failed to ensure schema");

    // Redis connection (class locks + rate limiting)
    let redis_client = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);

    // Kafka connection
    let kafka_producer = EventProducer::new(&config.kafka.brokers)
        .expect("Failed to create Kafka producer");
    let kafka_arc = Arc::new(kafka_producer);

    let booking_repo = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let class_repo: Arc<PgClassRepository> = Arc::new(PgClassRepository::new(db.pool.clone()));

    let rules = config.business_rules.clone();
    let capacity = Arc::new(CapacityStore::new());
    let engine = Arc::new(BookingEngine::new(
        capacity.clone(),
        Arc::new(CreditLedger::new()),
        Arc::new(WaitlistQueue::new(rules.waitlist_max_size)),
        redis_arc.clone(),
        Arc::new(MockPaymentGateway::new()),
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
        EngineConfig {
            cancellation_grace: chrono::Duration::hours(rules.cancellation_grace_hours),
            lock_lease: Duration::from_secs(rules.lock_lease_seconds),
        },
    ));

    // Rehydrate the class roster from the durable mirror
    match class_repo.list_classes().await {
        Ok(classes) => {
            tracing::info!("Loaded {} classes from the database", classes.len());
            for class in classes {
                capacity.insert(class);
            }
        }
        Err(e) => tracing::error!("Failed to load classes: {}", e),
    }

    let app_state = AppState {
        engine,
        redis: redis_arc,
        kafka: kafka_arc,
        booking_repo,
        class_repo,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: rules,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
