use chrono::{DateTime, Local, NaiveDate};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::{TimeOfDay, TimeWindow},
    my_date_format,
    schema::*,
};

#[derive(Queryable, Serialize, Clone, Debug)]
pub struct DiningTable {
    #[serde(skip)]
    pub id: i64,

    pub table_id: Uuid,
    pub table_name: String,
    pub capacity: i32,
    pub is_active: bool,

    #[serde(with = "my_date_format")]
    pub create_time: DateTime<Local>,
    #[serde(with = "my_date_format")]
    pub update_time: DateTime<Local>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name=dining_tables)]
pub struct NewDiningTable {
    pub table_id: Uuid,
    pub table_name: String,
    pub capacity: i32,
    pub is_active: bool,
    pub create_time: DateTime<Local>,
    pub update_time: DateTime<Local>,
}

/// Partial update for a table; `None` fields are left untouched and the whole
/// set is applied as a single row update.
#[derive(AsChangeset, Default, Debug, Clone)]
#[diesel(table_name=dining_tables)]
pub struct DiningTableChanges {
    pub table_name: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
    pub update_time: Option<DateTime<Local>>,
}

/// Reservation lifecycle states. `cancelled` is terminal; no transition
/// leaves it. Creation always lands in `confirmed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl ToSql<Text, Pg> for ReservationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        use std::io::Write;
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for ReservationStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match value.as_bytes() {
            b"confirmed" => Ok(ReservationStatus::Confirmed),
            b"cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!(
                "unknown reservation status: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

/// Which entry point created the reservation. Guest bookings count as
/// customer-created; the guest is recognizable by a missing customer_id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    Customer,
    Staff,
}

impl CreatedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreatedBy::Customer => "customer",
            CreatedBy::Staff => "staff",
        }
    }
}

impl ToSql<Text, Pg> for CreatedBy {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        use std::io::Write;
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for CreatedBy {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        match value.as_bytes() {
            b"customer" => Ok(CreatedBy::Customer),
            b"staff" => Ok(CreatedBy::Staff),
            other => Err(format!(
                "unknown reservation origin: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

#[derive(Queryable, Serialize, Clone, Debug)]
pub struct Reservation {
    #[serde(skip)]
    pub id: i64,

    pub reservation_id: Uuid,
    pub table_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub note: Option<String>,
    pub created_by: CreatedBy,

    #[serde(with = "my_date_format")]
    pub create_time: DateTime<Local>,
    #[serde(with = "my_date_format")]
    pub update_time: DateTime<Local>,
}

impl Reservation {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name=reservations)]
pub struct NewReservation {
    pub reservation_id: Uuid,
    pub table_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub note: Option<String>,
    pub created_by: CreatedBy,
    pub create_time: DateTime<Local>,
    pub update_time: DateTime<Local>,
}

/// Sparse staff edit applied as one atomic row update. Outer `None` means the
/// field was not supplied; `Some(None)` on a nullable column clears it.
#[derive(AsChangeset, Default, Debug, Clone)]
#[diesel(table_name=reservations)]
pub struct ReservationChanges {
    pub table_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub party_size: Option<i32>,
    pub status: Option<ReservationStatus>,
    pub note: Option<Option<String>>,
    pub update_time: Option<DateTime<Local>>,
}

#[derive(Queryable, Serialize, Clone, Debug)]
pub struct Profile {
    #[serde(skip)]
    pub id: i64,

    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub staff_note: Option<String>,

    #[serde(with = "my_date_format")]
    pub create_time: DateTime<Local>,
    #[serde(with = "my_date_format")]
    pub update_time: DateTime<Local>,
}

#[derive(AsChangeset, Default, Debug, Clone)]
#[diesel(table_name=profiles)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub staff_note: Option<Option<String>>,
    pub update_time: Option<DateTime<Local>>,
}
