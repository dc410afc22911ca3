use std::{
    fmt,
    str::FromStr,
    sync::{Arc, OnceLock},
};

use chrono::{Local, NaiveDate};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Integer,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{
    errors::DomainError,
    models::DiningTable,
    store::{ReservationStore, TableStore},
};

pub const DEFAULT_DURATION_MINUTES: u16 = 120;

/// Wall-clock time carried as minutes since midnight, read and written as
/// zero-padded "HH:MM". A derived end time may pass 24:00 textually (a 23:00
/// start with the default duration reads "25:00"); the date never rolls over,
/// so ordering within one day stays monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Integer)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> TimeOfDay {
        TimeOfDay(minutes)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn plus(&self, minutes: u16) -> TimeOfDay {
        TimeOfDay(self.0 + minutes)
    }
}

impl FromStr for TimeOfDay {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || DomainError::Validation(format!("invalid time of day {s:?}, expected HH:MM"));
        let (hh, mm) = s.split_once(':').ok_or_else(invalid)?;
        if hh.len() != 2 || mm.len() != 2 {
            return Err(invalid());
        }
        let hours: u16 = hh.parse().map_err(|_| invalid())?;
        let minutes: u16 = mm.parse().map_err(|_| invalid())?;
        // hours up to 47 so stored past-midnight end times round-trip
        if hours > 47 || minutes > 59 {
            return Err(invalid());
        }
        Ok(TimeOfDay(hours * 60 + minutes))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: DomainError| de::Error::custom(e))
    }
}

impl ToSql<Integer, Pg> for TimeOfDay {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        use std::io::Write;
        out.write_all(&i32::from(self.0).to_be_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Integer, Pg> for TimeOfDay {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let minutes = <i32 as FromSql<Integer, Pg>>::from_sql(value)?;
        let minutes = u16::try_from(minutes).map_err(|_| "time-of-day minutes out of range")?;
        Ok(TimeOfDay(minutes))
    }
}

/// Half-open [start, end) interval on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    /// A missing end defaults to two hours after the start. Whether
    /// end > start holds is deliberately not checked here; the conflict rule
    /// treats an inverted window as overlapping nothing.
    pub fn new(start: TimeOfDay, end: Option<TimeOfDay>) -> TimeWindow {
        TimeWindow {
            start,
            end: end.unwrap_or_else(|| start.plus(DEFAULT_DURATION_MINUTES)),
        }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

pub fn check_party_size(party_size: i32) -> Result<(), DomainError> {
    if party_size < 1 {
        return Err(DomainError::Validation(
            "party size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub fn check_phone(phone: &str) -> Result<(), DomainError> {
    static PHONE_PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    let pattern = PHONE_PATTERN
        .get_or_init(|| regex::Regex::new(r"^0\d{9,10}$").expect("static phone pattern"));
    if !pattern.is_match(phone) {
        return Err(DomainError::Validation(
            "phone number must be 10-11 digits starting with 0".to_string(),
        ));
    }
    Ok(())
}

/// Rejects empty and inverted windows before they reach a store. The Postgres
/// backend cannot even represent an inverted window in its range column, so
/// letting one through would surface as a system failure instead of a 400.
pub fn check_time_window(window: &TimeWindow) -> Result<(), DomainError> {
    if window.end <= window.start {
        return Err(DomainError::Validation(
            "end time must be after start time".to_string(),
        ));
    }
    Ok(())
}

pub fn check_reservation_date(date: NaiveDate) -> Result<(), DomainError> {
    if date < Local::now().date_naive() {
        return Err(DomainError::Validation(
            "cannot book a date in the past".to_string(),
        ));
    }
    Ok(())
}

/// Capacity guard shared by creation (via the policy) and staff edits.
pub fn assert_fits(table: &DiningTable, party_size: i32) -> Result<(), DomainError> {
    if party_size > table.capacity {
        return Err(DomainError::Validation(format!(
            "this table seats at most {} people",
            table.capacity
        )));
    }
    Ok(())
}

/// Central admission check for a proposed booking: table must exist and be
/// active, the party must fit, and the window must not overlap a confirmed
/// reservation. Read-only and safe to call repeatedly; the durable overlap
/// guarantee still rests on the store's write-time exclusion constraint.
pub struct BookingPolicy {
    tables: Arc<dyn TableStore>,
    reservations: Arc<dyn ReservationStore>,
}

impl BookingPolicy {
    pub fn new(
        tables: Arc<dyn TableStore>,
        reservations: Arc<dyn ReservationStore>,
    ) -> BookingPolicy {
        BookingPolicy {
            tables,
            reservations,
        }
    }

    pub fn validate_booking(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        party_size: i32,
        exclude_reservation_id: Option<Uuid>,
    ) -> Result<(), DomainError> {
        let table = self
            .tables
            .find_active(table_id)?
            .ok_or_else(|| DomainError::NotFound("table not found".to_string()))?;

        assert_fits(&table, party_size)?;

        if self
            .reservations
            .has_conflict(table_id, date, window, exclude_reservation_id)?
        {
            return Err(DomainError::Conflict(
                "the time window overlaps an existing reservation on this table; pick another time or table"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        models::{CreatedBy, NewDiningTable, NewReservation, ReservationStatus},
        store::{memory::MemoryStore, StoreError},
    };

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow {
            start: t(start),
            end: t(end),
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    struct Fixture {
        tables: Arc<dyn TableStore>,
        reservations: Arc<dyn ReservationStore>,
        policy: BookingPolicy,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let tables: Arc<dyn TableStore> = store.clone();
        let reservations: Arc<dyn ReservationStore> = store;
        let policy = BookingPolicy::new(tables.clone(), reservations.clone());
        Fixture {
            tables,
            reservations,
            policy,
        }
    }

    fn seed_table(fx: &Fixture, capacity: i32) -> Uuid {
        let table = fx
            .tables
            .insert(NewDiningTable {
                table_id: Uuid::new_v4(),
                table_name: "T1".to_string(),
                capacity,
                is_active: true,
                create_time: Local::now(),
                update_time: Local::now(),
            })
            .unwrap();
        table.table_id
    }

    fn new_reservation(
        table_id: Uuid,
        date: NaiveDate,
        start: &str,
        end: &str,
        party_size: i32,
    ) -> NewReservation {
        NewReservation {
            reservation_id: Uuid::new_v4(),
            table_id,
            customer_id: None,
            customer_name: "Sato".to_string(),
            customer_phone: Some("09012345678".to_string()),
            date,
            start_time: t(start),
            end_time: t(end),
            party_size,
            status: ReservationStatus::Confirmed,
            note: None,
            created_by: CreatedBy::Customer,
            create_time: Local::now(),
            update_time: Local::now(),
        }
    }

    #[test]
    fn time_of_day_parses_and_formats() {
        assert_eq!(t("00:00").minutes(), 0);
        assert_eq!(t("18:30").minutes(), 18 * 60 + 30);
        assert_eq!(t("18:30").to_string(), "18:30");
        assert_eq!(t("25:00").to_string(), "25:00");
        assert_eq!(TimeOfDay::from_minutes(540).to_string(), "09:00");
    }

    #[test]
    fn time_of_day_rejects_malformed_input() {
        for bad in ["", "18", "18:", "1800", "18:60", "ab:cd", "48:00", "8:00"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn time_of_day_serde_uses_hh_mm_strings() {
        let json = serde_json::to_string(&t("19:15")).unwrap();
        assert_eq!(json, "\"19:15\"");
        let back: TimeOfDay = serde_json::from_str("\"19:15\"").unwrap();
        assert_eq!(back, t("19:15"));
    }

    #[test]
    fn missing_end_defaults_to_two_hours_after_start() {
        let w = TimeWindow::new(t("18:00"), None);
        assert_eq!(w.end, t("20:00"));

        let w = TimeWindow::new(t("18:00"), Some(t("19:30")));
        assert_eq!(w.end, t("19:30"));
    }

    #[test]
    fn derived_end_passes_midnight_textually() {
        let w = TimeWindow::new(t("23:00"), None);
        assert_eq!(w.end.to_string(), "25:00");
    }

    #[test]
    fn adjacent_windows_do_not_overlap() {
        let a = window("18:00", "20:00");
        let b = window("20:00", "22:00");
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn one_minute_of_overlap_is_detected() {
        let a = window("18:00", "20:00");
        let b = window("19:59", "22:00");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn containment_counts_as_overlap() {
        let a = window("18:00", "22:00");
        let b = window("19:00", "20:00");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn inverted_window_overlaps_nothing() {
        let a = window("20:00", "18:00");
        let b = window("18:00", "22:00");
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn party_size_lower_bound() {
        assert!(check_party_size(1).is_ok());
        assert!(matches!(
            check_party_size(0),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn empty_and_inverted_windows_are_rejected() {
        assert!(matches!(
            check_time_window(&window("20:00", "18:00")),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            check_time_window(&window("18:00", "18:00")),
            Err(DomainError::Validation(_))
        ));
        assert!(check_time_window(&window("18:00", "20:00")).is_ok());
        // a derived past-midnight end is still a forward window
        assert!(check_time_window(&TimeWindow::new(t("23:00"), None)).is_ok());
    }

    #[test]
    fn phone_format() {
        assert!(check_phone("09012345678").is_ok());
        assert!(check_phone("0312345678").is_ok());
        assert!(check_phone("12345678901").is_err());
        assert!(check_phone("090-1234-5678").is_err());
    }

    #[test]
    fn unknown_table_is_not_found() {
        let fx = fixture();
        let err = fx
            .policy
            .validate_booking(Uuid::new_v4(), date("2025-06-01"), &window("18:00", "20:00"), 2, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn deactivated_table_is_not_found() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        fx.tables.deactivate(table_id).unwrap().unwrap();

        let err = fx
            .policy
            .validate_booking(table_id, date("2025-06-01"), &window("18:00", "20:00"), 2, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn capacity_boundary() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        let d = date("2025-06-01");

        assert!(fx
            .policy
            .validate_booking(table_id, d, &window("18:00", "20:00"), 4, None)
            .is_ok());
        let err = fx
            .policy
            .validate_booking(table_id, d, &window("18:00", "20:00"), 5, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn overlapping_booking_is_a_conflict() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        let d = date("2025-06-01");
        fx.reservations
            .insert(new_reservation(table_id, d, "18:00", "20:00", 2))
            .unwrap();

        let err = fx
            .policy
            .validate_booking(table_id, d, &window("19:00", "21:00"), 2, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn editing_a_reservation_never_conflicts_with_itself() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        let d = date("2025-06-01");
        let existing = fx
            .reservations
            .insert(new_reservation(table_id, d, "18:00", "20:00", 2))
            .unwrap();

        // identical window, excluded from the scan
        assert!(fx
            .policy
            .validate_booking(
                table_id,
                d,
                &window("18:00", "20:00"),
                2,
                Some(existing.reservation_id)
            )
            .is_ok());
    }

    #[test]
    fn cancelled_reservations_never_block() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        let d = date("2025-06-01");
        let existing = fx
            .reservations
            .insert(new_reservation(table_id, d, "18:00", "20:00", 2))
            .unwrap();
        fx.reservations
            .cancel_by_staff(existing.reservation_id)
            .unwrap()
            .unwrap();

        assert!(fx
            .policy
            .validate_booking(table_id, d, &window("18:00", "20:00"), 2, None)
            .is_ok());
    }

    #[test]
    fn losing_the_insert_race_is_a_slot_taken_error() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        let d = date("2025-06-01");
        let first = new_reservation(table_id, d, "18:00", "20:00", 2);
        let second = new_reservation(table_id, d, "19:00", "21:00", 2);

        // both requests validated against an empty table before either wrote
        assert!(fx
            .policy
            .validate_booking(table_id, d, &window("18:00", "20:00"), 2, None)
            .is_ok());
        assert!(fx
            .policy
            .validate_booking(table_id, d, &window("19:00", "21:00"), 2, None)
            .is_ok());

        fx.reservations.insert(first).unwrap();
        let err = fx.reservations.insert(second).unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken));
    }

    #[test]
    fn booking_scenario_end_to_end() {
        let fx = fixture();
        let table_id = seed_table(&fx, 4);
        let d = date("2025-06-01");

        // 18:00-20:00 for 3 as guest succeeds and lands confirmed
        fx.policy
            .validate_booking(table_id, d, &window("18:00", "20:00"), 3, None)
            .unwrap();
        let first = fx
            .reservations
            .insert(new_reservation(table_id, d, "18:00", "20:00", 3))
            .unwrap();
        assert_eq!(first.status, ReservationStatus::Confirmed);

        // 19:00-21:00 overlaps
        let err = fx
            .policy
            .validate_booking(table_id, d, &window("19:00", "21:00"), 2, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // 20:00-22:00 is adjacent, allowed
        fx.policy
            .validate_booking(table_id, d, &window("20:00", "22:00"), 2, None)
            .unwrap();
        fx.reservations
            .insert(new_reservation(table_id, d, "20:00", "22:00", 2))
            .unwrap();

        // cancelling the first frees its slot
        fx.reservations
            .cancel_by_staff(first.reservation_id)
            .unwrap()
            .unwrap();
        fx.policy
            .validate_booking(table_id, d, &window("18:30", "19:30"), 2, None)
            .unwrap();
    }
}
