pub mod memory;
pub mod pg;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    booking::TimeWindow,
    models::{
        DiningTable, DiningTableChanges, NewDiningTable, NewReservation, Profile, ProfileChanges,
        Reservation, ReservationChanges, ReservationStatus,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A concurrent writer committed an overlapping confirmed reservation (or
    /// an equivalent uniqueness violation) between validation and this write.
    #[error("the slot was taken by a concurrent booking")]
    SlotTaken,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Default, Clone)]
pub struct ReservationFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<ReservationStatus>,
}

pub trait TableStore: Send + Sync {
    fn find_active(&self, table_id: Uuid) -> Result<Option<DiningTable>, StoreError>;
    fn list_active(&self) -> Result<Vec<DiningTable>, StoreError>;
    fn insert(&self, new_table: NewDiningTable) -> Result<DiningTable, StoreError>;
    fn update(
        &self,
        table_id: Uuid,
        changes: DiningTableChanges,
    ) -> Result<Option<DiningTable>, StoreError>;
    /// Soft delete: flips is_active off so history keeps its references.
    fn deactivate(&self, table_id: Uuid) -> Result<Option<DiningTable>, StoreError>;
}

pub trait ReservationStore: Send + Sync {
    fn find(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError>;
    fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError>;
    fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>, StoreError>;
    fn list_by_phone(&self, phone: &str) -> Result<Vec<Reservation>, StoreError>;

    /// True when a confirmed reservation on the same table and date overlaps
    /// the window ([s1,e1) and [s2,e2) overlap iff s1 < e2 and e1 > s2).
    /// `exclude_reservation_id` keeps an edited reservation from colliding
    /// with itself.
    fn has_conflict(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude_reservation_id: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    /// Writers must uphold the overlap invariant themselves: an insert that
    /// would double-book fails with `SlotTaken` even if a validation read saw
    /// the slot free.
    fn insert(&self, new_reservation: NewReservation) -> Result<Reservation, StoreError>;
    fn update(
        &self,
        reservation_id: Uuid,
        changes: ReservationChanges,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Guarded status flip confirmed -> cancelled; `None` when the
    /// reservation is missing or already cancelled.
    fn cancel_by_staff(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError>;
    /// As above, additionally requiring ownership; a non-owner gets `None`,
    /// indistinguishable from a missing reservation.
    fn cancel_by_customer(
        &self,
        reservation_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError>;
}

pub trait ProfileStore: Send + Sync {
    fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
    fn find_by_phone(&self, phone: &str) -> Result<Option<Profile>, StoreError>;
    fn list_customers(&self) -> Result<Vec<Profile>, StoreError>;
    fn update(&self, user_id: Uuid, changes: ProfileChanges)
        -> Result<Option<Profile>, StoreError>;
}
