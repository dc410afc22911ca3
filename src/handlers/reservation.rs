use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bearer_auth_middleware::{CustomerIdentity, StaffIdentity};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::{
        check_party_size, check_phone, check_reservation_date, check_time_window, TimeOfDay,
        TimeWindow,
    },
    errors::DomainError,
    models::{
        CreatedBy, DiningTable, NewReservation, Reservation, ReservationChanges, ReservationStatus,
    },
    store::ReservationFilter,
    AppState,
};

use super::double_option;

#[derive(Deserialize)]
pub struct AvailabilityParams {
    pub date: NaiveDate,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub tables: Vec<DiningTable>,
    pub reservations: Vec<Reservation>,
}

/// Public view of one day: the active tables and the confirmed reservations
/// occupying them. Callers compute free windows client-side.
pub async fn get_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<AvailabilityResponse>, DomainError> {
    let tables = state.tables.list_active()?;
    let reservations = state.reservations.list(&ReservationFilter {
        date: Some(params.date),
        status: Some(ReservationStatus::Confirmed),
    })?;

    Ok(Json(AvailabilityResponse {
        date: params.date,
        tables,
        reservations,
    }))
}

#[derive(Deserialize, Default)]
pub struct ReservationListParams {
    pub date: Option<NaiveDate>,
    pub status: Option<ReservationStatus>,
}

pub async fn get_reservations(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Query(params): Query<ReservationListParams>,
) -> Result<Json<Vec<Reservation>>, DomainError> {
    let reservations = state.reservations.list(&ReservationFilter {
        date: params.date,
        status: params.status,
    })?;
    Ok(Json(reservations))
}

pub async fn get_my_reservations(
    CustomerIdentity(identity): CustomerIdentity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Reservation>>, DomainError> {
    let reservations = state.reservations.list_by_customer(identity.user_id)?;
    Ok(Json(reservations))
}

#[derive(Deserialize)]
pub struct GuestReservationRequest {
    pub table_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: Option<TimeOfDay>,
    pub party_size: i32,
    pub note: Option<String>,
}

/// Walk-in booking without an account; the phone number is the only handle
/// staff have to find the booking again.
pub async fn add_guest_reservation(
    State(state): State<AppState>,
    Json(req): Json<GuestReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), DomainError> {
    if req.customer_name.trim().is_empty() {
        return Err(DomainError::Validation("name is required".to_string()));
    }
    check_phone(&req.customer_phone)?;
    check_party_size(req.party_size)?;
    check_reservation_date(req.date)?;

    let window = TimeWindow::new(req.start_time, req.end_time);
    check_time_window(&window)?;
    state
        .policy
        .validate_booking(req.table_id, req.date, &window, req.party_size, None)?;

    let reservation = state.reservations.insert(NewReservation {
        reservation_id: Uuid::new_v4(),
        table_id: req.table_id,
        customer_id: None,
        customer_name: req.customer_name,
        customer_phone: Some(req.customer_phone),
        date: req.date,
        start_time: window.start,
        end_time: window.end,
        party_size: req.party_size,
        status: ReservationStatus::Confirmed,
        note: req.note,
        created_by: CreatedBy::Customer,
        create_time: Local::now(),
        update_time: Local::now(),
    })?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

#[derive(Deserialize)]
pub struct CustomerReservationRequest {
    pub table_id: Uuid,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: Option<TimeOfDay>,
    pub party_size: i32,
    pub note: Option<String>,
}

/// Booking by a signed-in customer; name and phone come from the profile, not
/// the request body.
pub async fn add_customer_reservation(
    CustomerIdentity(identity): CustomerIdentity,
    State(state): State<AppState>,
    Json(req): Json<CustomerReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), DomainError> {
    check_party_size(req.party_size)?;
    check_reservation_date(req.date)?;

    let profile = state.profiles.find(identity.user_id)?;

    let window = TimeWindow::new(req.start_time, req.end_time);
    check_time_window(&window)?;
    state
        .policy
        .validate_booking(req.table_id, req.date, &window, req.party_size, None)?;

    let reservation = state.reservations.insert(NewReservation {
        reservation_id: Uuid::new_v4(),
        table_id: req.table_id,
        customer_id: Some(identity.user_id),
        customer_name: profile.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
        customer_phone: profile.and_then(|p| p.phone),
        date: req.date,
        start_time: window.start,
        end_time: window.end,
        party_size: req.party_size,
        status: ReservationStatus::Confirmed,
        note: req.note,
        created_by: CreatedBy::Customer,
        create_time: Local::now(),
        update_time: Local::now(),
    })?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

#[derive(Deserialize)]
pub struct StaffReservationRequest {
    pub table_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: Option<TimeOfDay>,
    pub party_size: i32,
    pub note: Option<String>,
}

/// Phone bookings taken at the counter. Staff may record any phone string the
/// caller gives (or none), so the guest format check does not apply.
pub async fn add_staff_reservation(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Json(req): Json<StaffReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), DomainError> {
    if req.customer_name.trim().is_empty() {
        return Err(DomainError::Validation("name is required".to_string()));
    }
    check_party_size(req.party_size)?;
    check_reservation_date(req.date)?;

    let window = TimeWindow::new(req.start_time, req.end_time);
    check_time_window(&window)?;
    state
        .policy
        .validate_booking(req.table_id, req.date, &window, req.party_size, None)?;

    let reservation = state.reservations.insert(NewReservation {
        reservation_id: Uuid::new_v4(),
        table_id: req.table_id,
        customer_id: None,
        customer_name: req.customer_name,
        customer_phone: req.customer_phone,
        date: req.date,
        start_time: window.start,
        end_time: window.end,
        party_size: req.party_size,
        status: ReservationStatus::Confirmed,
        note: req.note,
        created_by: CreatedBy::Staff,
        create_time: Local::now(),
        update_time: Local::now(),
    })?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

#[derive(Deserialize, Default)]
pub struct UpdateReservationRequest {
    pub table_id: Option<Uuid>,
    pub customer_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub customer_phone: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub party_size: Option<i32>,
    pub status: Option<ReservationStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub note: Option<Option<String>>,
}

/// Staff edit of a confirmed reservation. Only the supplied fields change;
/// when the slot (table, date or window) moves, the new slot is re-validated
/// against conflicts excluding the reservation itself. The only status change
/// an edit may carry is confirmed -> cancelled; cancelled stays terminal.
pub async fn update_reservation(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
    Json(req): Json<UpdateReservationRequest>,
) -> Result<Json<Reservation>, DomainError> {
    let current = state
        .reservations
        .find(reservation_id)?
        .ok_or_else(|| DomainError::NotFound("reservation not found".to_string()))?;
    if current.status != ReservationStatus::Confirmed {
        return Err(DomainError::NotFound(
            "reservation not found or already cancelled".to_string(),
        ));
    }

    if let Some(name) = &req.customer_name {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("name is required".to_string()));
        }
    }
    if let Some(party_size) = req.party_size {
        check_party_size(party_size)?;
    }
    if let Some(date) = req.date {
        check_reservation_date(date)?;
    }

    // merged slot the reservation would occupy after the edit
    let table_id = req.table_id.unwrap_or(current.table_id);
    let date = req.date.unwrap_or(current.date);
    let window = TimeWindow {
        start: req.start_time.unwrap_or(current.start_time),
        end: req.end_time.unwrap_or(current.end_time),
    };
    let party_size = req.party_size.unwrap_or(current.party_size);
    let status = req.status.unwrap_or(current.status);

    let slot_changed = table_id != current.table_id
        || date != current.date
        || window != current.window()
        || party_size != current.party_size;
    if slot_changed {
        check_time_window(&window)?;
    }
    // a reservation being cancelled in this edit stops occupying its slot,
    // so only a still-confirmed one is re-admitted
    if slot_changed && status == ReservationStatus::Confirmed {
        state
            .policy
            .validate_booking(table_id, date, &window, party_size, Some(reservation_id))?;
    }

    let changes = ReservationChanges {
        table_id: req.table_id,
        customer_name: req.customer_name,
        customer_phone: req.customer_phone,
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        party_size: req.party_size,
        status: req.status,
        note: req.note,
        update_time: None,
    };

    let updated = state
        .reservations
        .update(reservation_id, changes)?
        .ok_or_else(|| DomainError::NotFound("reservation not found".to_string()))?;
    Ok(Json(updated))
}

pub async fn cancel_reservation(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, DomainError> {
    let cancelled = state
        .reservations
        .cancel_by_staff(reservation_id)?
        .ok_or_else(|| {
            DomainError::NotFound("reservation not found or already cancelled".to_string())
        })?;
    Ok(Json(cancelled))
}

/// Customer cancel; ownership is part of the lookup, so a reservation owned
/// by someone else reads the same as a missing one.
pub async fn cancel_my_reservation(
    CustomerIdentity(identity): CustomerIdentity,
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, DomainError> {
    let cancelled = state
        .reservations
        .cancel_by_customer(reservation_id, identity.user_id)?
        .ok_or_else(|| {
            DomainError::NotFound("reservation not found or cannot be cancelled".to_string())
        })?;
    Ok(Json(cancelled))
}
