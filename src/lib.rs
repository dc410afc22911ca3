pub mod auth_provider;
pub mod booking;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod schema;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::extract::FromRef;
use bearer_auth_middleware::AuthProvider;

use crate::{
    booking::BookingPolicy,
    store::{ProfileStore, ReservationStore, TableStore},
};

#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<dyn TableStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub policy: Arc<BookingPolicy>,
    pub auth: Arc<dyn AuthProvider>,
}

impl FromRef<AppState> for Arc<dyn AuthProvider> {
    fn from_ref(state: &AppState) -> Arc<dyn AuthProvider> {
        state.auth.clone()
    }
}

pub mod my_date_format {
    use chrono::{DateTime, Local, TimeZone};
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(date: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}", date.format(FORMAT));
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Local
            .datetime_from_str(&s, FORMAT)
            .map_err(serde::de::Error::custom)
    }
}
