use axum::{
    extract::{Path, Query, State},
    Json,
};
use bearer_auth_middleware::{CustomerIdentity, StaffIdentity};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::check_phone,
    errors::DomainError,
    models::{Profile, ProfileChanges, Reservation, ReservationStatus},
    AppState,
};

use super::double_option;

pub async fn get_customers(
    _staff: StaffIdentity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Profile>>, DomainError> {
    let customers = state.profiles.list_customers()?;
    Ok(Json(customers))
}

#[derive(Serialize)]
pub struct CustomerDetailResponse {
    pub profile: Profile,
    pub visit_count: i64,
    pub reservations: Vec<Reservation>,
}

fn count_visits(reservations: &[Reservation]) -> i64 {
    let today = Local::now().date_naive();
    reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Confirmed && r.date <= today)
        .count() as i64
}

pub async fn get_customer(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CustomerDetailResponse>, DomainError> {
    let profile = state
        .profiles
        .find(user_id)?
        .ok_or_else(|| DomainError::NotFound("customer not found".to_string()))?;
    let reservations = state.reservations.list_by_customer(user_id)?;

    Ok(Json(CustomerDetailResponse {
        visit_count: count_visits(&reservations),
        profile,
        reservations,
    }))
}

#[derive(Deserialize)]
pub struct PhoneLookupParams {
    pub phone: String,
}

#[derive(Serialize)]
pub struct PhoneLookupResponse {
    pub profile: Option<Profile>,
    pub visit_count: i64,
    pub reservations: Vec<Reservation>,
}

/// Counter lookup when a caller gives a phone number. Guest bookings have no
/// profile, so the profile slot may be empty while reservations are not.
pub async fn get_customer_by_phone(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Query(params): Query<PhoneLookupParams>,
) -> Result<Json<PhoneLookupResponse>, DomainError> {
    let profile = state.profiles.find_by_phone(&params.phone)?;
    let reservations = state.reservations.list_by_phone(&params.phone)?;

    Ok(Json(PhoneLookupResponse {
        visit_count: count_visits(&reservations),
        profile,
        reservations,
    }))
}

#[derive(Deserialize, Default)]
pub struct StaffNoteRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub note: Option<Option<String>>,
}

/// Free-form note staff keep about a customer (allergies, seating quirks).
/// An explicit null clears it; a request without the field is malformed.
pub async fn update_staff_note(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<StaffNoteRequest>,
) -> Result<Json<Profile>, DomainError> {
    let note = req
        .note
        .ok_or_else(|| DomainError::Validation("note is required".to_string()))?;
    let profile = state
        .profiles
        .update(
            user_id,
            ProfileChanges {
                staff_note: Some(note),
                ..Default::default()
            },
        )?
        .ok_or_else(|| DomainError::NotFound("customer not found".to_string()))?;
    Ok(Json(profile))
}

pub async fn get_my_profile(
    CustomerIdentity(identity): CustomerIdentity,
    State(state): State<AppState>,
) -> Result<Json<Profile>, DomainError> {
    let profile = state
        .profiles
        .find(identity.user_id)?
        .ok_or_else(|| DomainError::NotFound("profile not found".to_string()))?;
    Ok(Json(profile))
}

#[derive(Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
}

pub async fn update_my_profile(
    CustomerIdentity(identity): CustomerIdentity,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, DomainError> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("name is required".to_string()));
        }
    }
    if let Some(Some(phone)) = &req.phone {
        check_phone(phone)?;
    }

    let profile = state
        .profiles
        .update(
            identity.user_id,
            ProfileChanges {
                name: req.name,
                phone: req.phone,
                ..Default::default()
            },
        )?
        .ok_or_else(|| DomainError::NotFound("profile not found".to_string()))?;
    Ok(Json(profile))
}
