use anyhow::Context;
use chrono::{Local, NaiveDate};
use diesel::{
    dsl::exists,
    prelude::*,
    r2d2::{ConnectionManager, Pool, PooledConnection},
    select,
};
use uuid::Uuid;

use super::{ProfileStore, ReservationFilter, ReservationStore, StoreError, TableStore};
use crate::{
    booking::TimeWindow,
    models::{
        DiningTable, DiningTableChanges, NewDiningTable, NewReservation, Profile, ProfileChanges,
        Reservation, ReservationChanges, ReservationStatus,
    },
    schema::*,
};

/// Gist exclusion constraint that keeps confirmed reservations on one table
/// and date from overlapping; the database enforces the invariant even when
/// two validations raced each other.
const NO_OVERLAP_CONSTRAINT: &str = "reservations_no_overlap";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl PgStore {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> PgStore {
        PgStore { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
        self.pool
            .get()
            .context("cannot get a connection from the pool")
            .map_err(StoreError::Backend)
    }
}

fn backend(e: diesel::result::Error) -> StoreError {
    StoreError::Backend(e.into())
}

/// Write failures caused by the overlap constraint (or any uniqueness
/// violation) surface as `SlotTaken` so callers can say "pick another slot".
fn map_write_error(e: diesel::result::Error) -> StoreError {
    use diesel::result::{DatabaseErrorKind, Error};
    match e {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => StoreError::SlotTaken,
        Error::DatabaseError(_, ref info)
            if info.constraint_name() == Some(NO_OVERLAP_CONSTRAINT) =>
        {
            StoreError::SlotTaken
        }
        other => StoreError::Backend(other.into()),
    }
}

impl TableStore for PgStore {
    fn find_active(&self, table_id: Uuid) -> Result<Option<DiningTable>, StoreError> {
        let mut conn = self.conn()?;

        dining_tables::table
            .filter(dining_tables::table_id.eq(table_id))
            .filter(dining_tables::is_active.eq(true))
            .get_result::<DiningTable>(&mut *conn)
            .optional()
            .map_err(backend)
    }

    fn list_active(&self) -> Result<Vec<DiningTable>, StoreError> {
        let mut conn = self.conn()?;

        dining_tables::table
            .filter(dining_tables::is_active.eq(true))
            .order(dining_tables::id.asc())
            .get_results::<DiningTable>(&mut *conn)
            .map_err(backend)
    }

    fn insert(&self, new_table: NewDiningTable) -> Result<DiningTable, StoreError> {
        let mut conn = self.conn()?;

        diesel::insert_into(dining_tables::table)
            .values(&new_table)
            .get_result::<DiningTable>(&mut *conn)
            .map_err(backend)
    }

    fn update(
        &self,
        table_id: Uuid,
        mut changes: DiningTableChanges,
    ) -> Result<Option<DiningTable>, StoreError> {
        let mut conn = self.conn()?;

        changes.update_time = Some(Local::now());
        diesel::update(dining_tables::table.filter(dining_tables::table_id.eq(table_id)))
            .set(&changes)
            .get_result::<DiningTable>(&mut *conn)
            .optional()
            .map_err(backend)
    }

    fn deactivate(&self, table_id: Uuid) -> Result<Option<DiningTable>, StoreError> {
        let mut conn = self.conn()?;

        diesel::update(
            dining_tables::table
                .filter(dining_tables::table_id.eq(table_id))
                .filter(dining_tables::is_active.eq(true)),
        )
        .set((
            dining_tables::is_active.eq(false),
            dining_tables::update_time.eq(Local::now()),
        ))
        .get_result::<DiningTable>(&mut *conn)
        .optional()
        .map_err(backend)
    }
}

impl ReservationStore for PgStore {
    fn find(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        reservations::table
            .filter(reservations::reservation_id.eq(reservation_id))
            .get_result::<Reservation>(&mut *conn)
            .optional()
            .map_err(backend)
    }

    fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        let mut query = reservations::table.into_boxed();
        if let Some(date) = filter.date {
            query = query.filter(reservations::date.eq(date));
        }
        if let Some(status) = filter.status {
            query = query.filter(reservations::status.eq(status));
        }

        query
            .order((reservations::date.asc(), reservations::start_time.asc()))
            .get_results::<Reservation>(&mut *conn)
            .map_err(backend)
    }

    fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        reservations::table
            .filter(reservations::customer_id.eq(customer_id))
            .order((reservations::date.desc(), reservations::start_time.desc()))
            .get_results::<Reservation>(&mut *conn)
            .map_err(backend)
    }

    fn list_by_phone(&self, phone: &str) -> Result<Vec<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        reservations::table
            .filter(reservations::customer_phone.eq(phone))
            .order((reservations::date.desc(), reservations::start_time.desc()))
            .get_results::<Reservation>(&mut *conn)
            .map_err(backend)
    }

    fn has_conflict(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude_reservation_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;

        let mut query = reservations::table
            .filter(reservations::table_id.eq(table_id))
            .filter(reservations::date.eq(date))
            .filter(reservations::status.eq(ReservationStatus::Confirmed))
            .filter(reservations::start_time.lt(window.end))
            .filter(reservations::end_time.gt(window.start))
            .into_boxed();
        if let Some(exclude) = exclude_reservation_id {
            query = query.filter(reservations::reservation_id.ne(exclude));
        }

        select(exists(query))
            .get_result::<bool>(&mut *conn)
            .map_err(backend)
    }

    fn insert(&self, new_reservation: NewReservation) -> Result<Reservation, StoreError> {
        let mut conn = self.conn()?;

        diesel::insert_into(reservations::table)
            .values(&new_reservation)
            .get_result::<Reservation>(&mut *conn)
            .map_err(map_write_error)
    }

    fn update(
        &self,
        reservation_id: Uuid,
        mut changes: ReservationChanges,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        changes.update_time = Some(Local::now());
        diesel::update(
            reservations::table.filter(reservations::reservation_id.eq(reservation_id)),
        )
        .set(&changes)
        .get_result::<Reservation>(&mut *conn)
        .optional()
        .map_err(map_write_error)
    }

    fn cancel_by_staff(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        diesel::update(
            reservations::table
                .filter(reservations::reservation_id.eq(reservation_id))
                .filter(reservations::status.eq(ReservationStatus::Confirmed)),
        )
        .set((
            reservations::status.eq(ReservationStatus::Cancelled),
            reservations::update_time.eq(Local::now()),
        ))
        .get_result::<Reservation>(&mut *conn)
        .optional()
        .map_err(backend)
    }

    fn cancel_by_customer(
        &self,
        reservation_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.conn()?;

        diesel::update(
            reservations::table
                .filter(reservations::reservation_id.eq(reservation_id))
                .filter(reservations::customer_id.eq(customer_id))
                .filter(reservations::status.eq(ReservationStatus::Confirmed)),
        )
        .set((
            reservations::status.eq(ReservationStatus::Cancelled),
            reservations::update_time.eq(Local::now()),
        ))
        .get_result::<Reservation>(&mut *conn)
        .optional()
        .map_err(backend)
    }
}

impl ProfileStore for PgStore {
    fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let mut conn = self.conn()?;

        profiles::table
            .filter(profiles::user_id.eq(user_id))
            .get_result::<Profile>(&mut *conn)
            .optional()
            .map_err(backend)
    }

    fn find_by_phone(&self, phone: &str) -> Result<Option<Profile>, StoreError> {
        let mut conn = self.conn()?;

        profiles::table
            .filter(profiles::phone.eq(phone))
            .get_result::<Profile>(&mut *conn)
            .optional()
            .map_err(backend)
    }

    fn list_customers(&self) -> Result<Vec<Profile>, StoreError> {
        let mut conn = self.conn()?;

        profiles::table
            .filter(profiles::role.eq("customer"))
            .order(profiles::create_time.desc())
            .get_results::<Profile>(&mut *conn)
            .map_err(backend)
    }

    fn update(
        &self,
        user_id: Uuid,
        mut changes: ProfileChanges,
    ) -> Result<Option<Profile>, StoreError> {
        let mut conn = self.conn()?;

        changes.update_time = Some(Local::now());
        diesel::update(profiles::table.filter(profiles::user_id.eq(user_id)))
            .set(&changes)
            .get_result::<Profile>(&mut *conn)
            .optional()
            .map_err(backend)
    }
}
