use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bearer_auth_middleware::StaffIdentity;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    errors::DomainError,
    models::{DiningTable, DiningTableChanges, NewDiningTable},
    AppState,
};

pub async fn get_tables(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiningTable>>, DomainError> {
    let tables = state.tables.list_active()?;
    Ok(Json(tables))
}

#[derive(Deserialize)]
pub struct AddTableRequest {
    pub table_name: String,
    pub capacity: i32,
}

pub async fn add_table(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Json(req): Json<AddTableRequest>,
) -> Result<(StatusCode, Json<DiningTable>), DomainError> {
    if req.table_name.trim().is_empty() {
        return Err(DomainError::Validation(
            "table name is required".to_string(),
        ));
    }
    if req.capacity < 1 {
        return Err(DomainError::Validation(
            "capacity must be at least 1".to_string(),
        ));
    }

    let table = state.tables.insert(NewDiningTable {
        table_id: Uuid::new_v4(),
        table_name: req.table_name,
        capacity: req.capacity,
        is_active: true,
        create_time: Local::now(),
        update_time: Local::now(),
    })?;

    Ok((StatusCode::CREATED, Json(table)))
}

#[derive(Deserialize, Default)]
pub struct UpdateTableRequest {
    pub table_name: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

pub async fn update_table(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    Json(req): Json<UpdateTableRequest>,
) -> Result<Json<DiningTable>, DomainError> {
    if let Some(name) = &req.table_name {
        if name.trim().is_empty() {
            return Err(DomainError::Validation(
                "table name is required".to_string(),
            ));
        }
    }
    if let Some(capacity) = req.capacity {
        if capacity < 1 {
            return Err(DomainError::Validation(
                "capacity must be at least 1".to_string(),
            ));
        }
    }

    let table = state
        .tables
        .update(
            table_id,
            DiningTableChanges {
                table_name: req.table_name,
                capacity: req.capacity,
                is_active: req.is_active,
                update_time: None,
            },
        )?
        .ok_or_else(|| DomainError::NotFound("table not found".to_string()))?;
    Ok(Json(table))
}

/// Retires a table. Existing reservations keep pointing at it; it simply stops
/// accepting new bookings and disappears from listings.
pub async fn delete_table(
    _staff: StaffIdentity,
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
) -> Result<Json<Value>, DomainError> {
    state
        .tables
        .deactivate(table_id)?
        .ok_or_else(|| DomainError::NotFound("table not found".to_string()))?;
    Ok(Json(json!({ "message": "table deactivated" })))
}
