use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use uuid::Uuid;

use super::{ProfileStore, ReservationFilter, ReservationStore, StoreError, TableStore};
use crate::{
    booking::TimeWindow,
    models::{
        DiningTable, DiningTableChanges, NewDiningTable, NewReservation, Profile, ProfileChanges,
        Reservation, ReservationChanges, ReservationStatus,
    },
};

/// In-memory store backing the unit tests. It mirrors the Postgres behavior,
/// including the write-time overlap guard the exclusion constraint provides:
/// checks and writes happen under one lock, so a racing insert fails with
/// `SlotTaken` rather than double-booking.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    tables: Vec<DiningTable>,
    reservations: Vec<Reservation>,
    profiles: Vec<Profile>,
}

impl Inner {
    fn overlap_exists(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude_reservation_id: Option<Uuid>,
    ) -> bool {
        self.reservations.iter().any(|r| {
            r.table_id == table_id
                && r.date == date
                && r.status == ReservationStatus::Confirmed
                && Some(r.reservation_id) != exclude_reservation_id
                && r.window().overlaps(window)
        })
    }
}

impl MemoryStore {
    pub fn add_profile(
        &self,
        user_id: Uuid,
        name: &str,
        phone: Option<&str>,
        role: &str,
    ) -> Profile {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let profile = Profile {
            id: inner.next_id,
            user_id,
            name: name.to_string(),
            email: None,
            phone: phone.map(str::to_string),
            role: role.to_string(),
            staff_note: None,
            create_time: Local::now(),
            update_time: Local::now(),
        };
        inner.profiles.push(profile.clone());
        profile
    }
}

impl TableStore for MemoryStore {
    fn find_active(&self, table_id: Uuid) -> Result<Option<DiningTable>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tables
            .iter()
            .find(|t| t.table_id == table_id && t.is_active)
            .cloned())
    }

    fn list_active(&self) -> Result<Vec<DiningTable>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tables.iter().filter(|t| t.is_active).cloned().collect())
    }

    fn insert(&self, new_table: NewDiningTable) -> Result<DiningTable, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let table = DiningTable {
            id: inner.next_id,
            table_id: new_table.table_id,
            table_name: new_table.table_name,
            capacity: new_table.capacity,
            is_active: new_table.is_active,
            create_time: new_table.create_time,
            update_time: new_table.update_time,
        };
        inner.tables.push(table.clone());
        Ok(table)
    }

    fn update(
        &self,
        table_id: Uuid,
        changes: DiningTableChanges,
    ) -> Result<Option<DiningTable>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(table) = inner.tables.iter_mut().find(|t| t.table_id == table_id) else {
            return Ok(None);
        };
        if let Some(v) = changes.table_name {
            table.table_name = v;
        }
        if let Some(v) = changes.capacity {
            table.capacity = v;
        }
        if let Some(v) = changes.is_active {
            table.is_active = v;
        }
        table.update_time = changes.update_time.unwrap_or_else(Local::now);
        Ok(Some(table.clone()))
    }

    fn deactivate(&self, table_id: Uuid) -> Result<Option<DiningTable>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(table) = inner
            .tables
            .iter_mut()
            .find(|t| t.table_id == table_id && t.is_active)
        else {
            return Ok(None);
        };
        table.is_active = false;
        table.update_time = Local::now();
        Ok(Some(table.clone()))
    }
}

impl ReservationStore for MemoryStore {
    fn find(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reservations
            .iter()
            .find(|r| r.reservation_id == reservation_id)
            .cloned())
    }

    fn list(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<Reservation> = inner
            .reservations
            .iter()
            .filter(|r| filter.date.map_or(true, |d| r.date == d))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        matches.sort_by_key(|r| (r.date, r.start_time));
        Ok(matches)
    }

    fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<Reservation> = inner
            .reservations
            .iter()
            .filter(|r| r.customer_id == Some(customer_id))
            .cloned()
            .collect();
        matches.sort_by_key(|r| std::cmp::Reverse((r.date, r.start_time)));
        Ok(matches)
    }

    fn list_by_phone(&self, phone: &str) -> Result<Vec<Reservation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<Reservation> = inner
            .reservations
            .iter()
            .filter(|r| r.customer_phone.as_deref() == Some(phone))
            .cloned()
            .collect();
        matches.sort_by_key(|r| std::cmp::Reverse((r.date, r.start_time)));
        Ok(matches)
    }

    fn has_conflict(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude_reservation_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.overlap_exists(table_id, date, window, exclude_reservation_id))
    }

    fn insert(&self, new_reservation: NewReservation) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let window = TimeWindow {
            start: new_reservation.start_time,
            end: new_reservation.end_time,
        };
        if new_reservation.status == ReservationStatus::Confirmed
            && inner.overlap_exists(new_reservation.table_id, new_reservation.date, &window, None)
        {
            return Err(StoreError::SlotTaken);
        }

        inner.next_id += 1;
        let reservation = Reservation {
            id: inner.next_id,
            reservation_id: new_reservation.reservation_id,
            table_id: new_reservation.table_id,
            customer_id: new_reservation.customer_id,
            customer_name: new_reservation.customer_name,
            customer_phone: new_reservation.customer_phone,
            date: new_reservation.date,
            start_time: new_reservation.start_time,
            end_time: new_reservation.end_time,
            party_size: new_reservation.party_size,
            status: new_reservation.status,
            note: new_reservation.note,
            created_by: new_reservation.created_by,
            create_time: new_reservation.create_time,
            update_time: new_reservation.update_time,
        };
        inner.reservations.push(reservation.clone());
        Ok(reservation)
    }

    fn update(
        &self,
        reservation_id: Uuid,
        changes: ReservationChanges,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(index) = inner
            .reservations
            .iter()
            .position(|r| r.reservation_id == reservation_id)
        else {
            return Ok(None);
        };

        let mut updated = inner.reservations[index].clone();
        if let Some(v) = changes.table_id {
            updated.table_id = v;
        }
        if let Some(v) = changes.customer_name {
            updated.customer_name = v;
        }
        if let Some(v) = changes.customer_phone {
            updated.customer_phone = v;
        }
        if let Some(v) = changes.date {
            updated.date = v;
        }
        if let Some(v) = changes.start_time {
            updated.start_time = v;
        }
        if let Some(v) = changes.end_time {
            updated.end_time = v;
        }
        if let Some(v) = changes.party_size {
            updated.party_size = v;
        }
        if let Some(v) = changes.status {
            updated.status = v;
        }
        if let Some(v) = changes.note {
            updated.note = v;
        }
        updated.update_time = changes.update_time.unwrap_or_else(Local::now);

        if updated.status == ReservationStatus::Confirmed
            && inner.overlap_exists(
                updated.table_id,
                updated.date,
                &updated.window(),
                Some(reservation_id),
            )
        {
            return Err(StoreError::SlotTaken);
        }

        inner.reservations[index] = updated.clone();
        Ok(Some(updated))
    }

    fn cancel_by_staff(&self, reservation_id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for r in inner.reservations.iter_mut() {
            if r.reservation_id == reservation_id && r.status == ReservationStatus::Confirmed {
                r.status = ReservationStatus::Cancelled;
                r.update_time = Local::now();
                return Ok(Some(r.clone()));
            }
        }
        Ok(None)
    }

    fn cancel_by_customer(
        &self,
        reservation_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for r in inner.reservations.iter_mut() {
            if r.reservation_id == reservation_id
                && r.customer_id == Some(customer_id)
                && r.status == ReservationStatus::Confirmed
            {
                r.status = ReservationStatus::Cancelled;
                r.update_time = Local::now();
                return Ok(Some(r.clone()));
            }
        }
        Ok(None)
    }
}

impl ProfileStore for MemoryStore {
    fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    fn find_by_phone(&self, phone: &str) -> Result<Option<Profile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .profiles
            .iter()
            .find(|p| p.phone.as_deref() == Some(phone))
            .cloned())
    }

    fn list_customers(&self) -> Result<Vec<Profile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .profiles
            .iter()
            .filter(|p| p.role == "customer")
            .cloned()
            .collect())
    }

    fn update(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<Profile>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(profile) = inner.profiles.iter_mut().find(|p| p.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(v) = changes.name {
            profile.name = v;
        }
        if let Some(v) = changes.phone {
            profile.phone = v;
        }
        if let Some(v) = changes.staff_note {
            profile.staff_note = v;
        }
        profile.update_time = changes.update_time.unwrap_or_else(Local::now);
        Ok(Some(profile.clone()))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::models::CreatedBy;

    fn t(s: &str) -> crate::booking::TimeOfDay {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn seed_reservation(
        reservations: &dyn ReservationStore,
        table_id: Uuid,
        customer_id: Option<Uuid>,
        date: NaiveDate,
        start: &str,
        end: &str,
    ) -> Reservation {
        reservations
            .insert(NewReservation {
                reservation_id: Uuid::new_v4(),
                table_id,
                customer_id,
                customer_name: "Tanaka".to_string(),
                customer_phone: Some("09012345678".to_string()),
                date,
                start_time: t(start),
                end_time: t(end),
                party_size: 2,
                status: ReservationStatus::Confirmed,
                note: Some("window seat".to_string()),
                created_by: CreatedBy::Customer,
                create_time: Local::now(),
                update_time: Local::now(),
            })
            .unwrap()
    }

    #[test]
    fn cancelling_twice_reports_not_found_semantics() {
        let store = Arc::new(MemoryStore::default());
        let r = seed_reservation(
            &*store,
            Uuid::new_v4(),
            None,
            date("2025-06-01"),
            "18:00",
            "20:00",
        );

        assert!(store.cancel_by_staff(r.reservation_id).unwrap().is_some());
        // second attempt finds nothing cancellable
        assert!(store.cancel_by_staff(r.reservation_id).unwrap().is_none());
    }

    #[test]
    fn a_customer_cannot_cancel_someone_elses_reservation() {
        let store = Arc::new(MemoryStore::default());
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let r = seed_reservation(
            &*store,
            Uuid::new_v4(),
            Some(owner),
            date("2025-06-01"),
            "18:00",
            "20:00",
        );

        assert!(store
            .cancel_by_customer(r.reservation_id, intruder)
            .unwrap()
            .is_none());
        // still confirmed, and the owner can cancel it
        assert_eq!(
            ReservationStore::find(&*store, r.reservation_id)
                .unwrap()
                .unwrap()
                .status,
            ReservationStatus::Confirmed
        );
        assert!(store
            .cancel_by_customer(r.reservation_id, owner)
            .unwrap()
            .is_some());
    }

    #[test]
    fn moving_a_reservation_onto_an_occupied_slot_fails() {
        let store = Arc::new(MemoryStore::default());
        let table_id = Uuid::new_v4();
        let d = date("2025-06-01");
        seed_reservation(&*store, table_id, None, d, "18:00", "20:00");
        let movable = seed_reservation(&*store, table_id, None, d, "20:00", "21:00");

        let err = ReservationStore::update(
            &*store,
            movable.reservation_id,
            ReservationChanges {
                start_time: Some(t("19:00")),
                end_time: Some(t("20:30")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken));
    }

    #[test]
    fn sparse_update_distinguishes_absent_from_cleared() {
        let store = Arc::new(MemoryStore::default());
        let r = seed_reservation(
            &*store,
            Uuid::new_v4(),
            None,
            date("2025-06-01"),
            "18:00",
            "20:00",
        );

        // absent note: unchanged
        let updated = ReservationStore::update(
            &*store,
            r.reservation_id,
            ReservationChanges {
                party_size: Some(3),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.note.as_deref(), Some("window seat"));
        assert_eq!(updated.party_size, 3);

        // explicit null: cleared
        let updated = ReservationStore::update(
            &*store,
            r.reservation_id,
            ReservationChanges {
                note: Some(None),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.note, None);
    }

    #[test]
    fn deactivated_tables_disappear_from_active_lookups() {
        let store = Arc::new(MemoryStore::default());
        let table = TableStore::insert(
            &*store,
            NewDiningTable {
                table_id: Uuid::new_v4(),
                table_name: "terrace".to_string(),
                capacity: 6,
                is_active: true,
                create_time: Local::now(),
                update_time: Local::now(),
            },
        )
        .unwrap();

        assert!(store.deactivate(table.table_id).unwrap().is_some());
        assert!(store.find_active(table.table_id).unwrap().is_none());
        assert!(TableStore::list_active(&*store).unwrap().is_empty());
        // a second deactivation has nothing left to do
        assert!(store.deactivate(table.table_id).unwrap().is_none());
    }
}
