use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use bearer_auth_middleware::AuthProvider;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dotenvy::dotenv;

use yoyaku_backend::{
    auth_provider::RemoteAuthProvider,
    booking::BookingPolicy,
    handlers::{customer::*, reservation::*, table::*},
    store::{pg::PgStore, ProfileStore, ReservationStore, TableStore},
    utils::get_connection_pool,
    AppState,
};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(PgStore::new(get_connection_pool()));
    let tables: Arc<dyn TableStore> = store.clone();
    let reservations: Arc<dyn ReservationStore> = store.clone();
    let profiles: Arc<dyn ProfileStore> = store;

    let policy = Arc::new(BookingPolicy::new(tables.clone(), reservations.clone()));
    let auth: Arc<dyn AuthProvider> = Arc::new(RemoteAuthProvider::new(
        std::env::var("AUTH_VERIFY_URL").expect("Cannot find AUTH_VERIFY_URL environment variable."),
        profiles.clone(),
    ));

    let state = AppState {
        tables,
        reservations,
        profiles,
        policy,
        auth,
    };

    let frontend_origin =
        std::env::var("FRONTEND_ORIGIN").expect("Cannot find FRONTEND_ORIGIN environment variable.");
    let host_ip = std::env::var("HOST_IP").expect("Cannot find HOST_IP environment variable.");
    let backend_port = std::env::var("BACKEND_PORT")
        .expect("Cannot find BACKEND_PORT environment variable.")
        .parse::<u16>()
        .expect("Not available BACKEND_PORT value");

    let app = Router::new()
        .route("/availability", get(get_availability))
        .route("/reservations", get(get_reservations))
        .route("/reservations/my", get(get_my_reservations))
        .route("/reservations/guest", post(add_guest_reservation))
        .route("/reservations/customer", post(add_customer_reservation))
        .route("/reservations/staff", post(add_staff_reservation))
        .route("/reservation/:reservation_id", post(update_reservation))
        .route("/reservation/:reservation_id/cancel", post(cancel_reservation))
        .route("/reservation/:reservation_id/cancel/my", post(cancel_my_reservation))
        .route("/tables", get(get_tables).post(add_table))
        .route("/table/:table_id", post(update_table).delete(delete_table))
        .route("/customers", get(get_customers))
        .route("/customer/by_phone", get(get_customer_by_phone))
        .route("/customer/:user_id", get(get_customer))
        .route("/customer/:user_id/note", post(update_staff_note))
        .route("/profile", get(get_my_profile).post(update_my_profile))
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin.parse::<HeaderValue>().unwrap())
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from((IpAddr::from_str(host_ip.as_str()).unwrap(), backend_port));

    tracing::debug!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
