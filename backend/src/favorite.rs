use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::{ApprovalStatus, Favorite, Property, Role};
use crate::property::PropertyResponse;
use crate::schema::{favorites, properties};
use crate::state::AppState;

pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(&[Role::Buyer])?;
    let conn = &mut state.db()?;

    let visible: i64 = properties::table
        .find(property_id.as_str())
        .filter(properties::approval_status.eq(ApprovalStatus::Approved.as_str()))
        .filter(properties::is_active.eq(true))
        .count()
        .get_result(conn)?;
    if visible == 0 {
        return Err(ApiError::NotFound("property not found".to_string()));
    }

    let already: i64 = favorites::table
        .filter(favorites::user_id.eq(current.id.as_str()))
        .filter(favorites::property_id.eq(property_id.as_str()))
        .count()
        .get_result(conn)?;
    if already > 0 {
        return Err(ApiError::Conflict("property already favorited".to_string()));
    }

    let favorite = Favorite {
        id: Uuid::new_v4().to_string(),
        user_id: current.id.clone(),
        property_id,
        created_at: Utc::now().naive_utc(),
    };
    diesel::insert_into(favorites::table)
        .values(&favorite)
        .execute(conn)?;

    Ok(Json(json!({ "message": "added to favorites" })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(&[Role::Buyer])?;
    let conn = &mut state.db()?;

    let removed = diesel::delete(
        favorites::table
            .filter(favorites::user_id.eq(current.id.as_str()))
            .filter(favorites::property_id.eq(property_id.as_str())),
    )
    .execute(conn)?;
    if removed == 0 {
        return Err(ApiError::NotFound("favorite not found".to_string()));
    }

    Ok(Json(json!({ "message": "removed from favorites" })))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<PropertyResponse>>, ApiError> {
    current.require_role(&[Role::Buyer])?;
    let conn = &mut state.db()?;

    let items: Vec<Property> = favorites::table
        .inner_join(properties::table)
        .filter(favorites::user_id.eq(current.id.as_str()))
        .order(favorites::created_at.desc())
        .select(Property::as_select())
        .load(conn)?;

    Ok(Json(items.into_iter().map(PropertyResponse::from).collect()))
}
