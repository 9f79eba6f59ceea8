use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::{ApprovalStatus, Lead, ListingType, Property, Role};
use crate::property::PropertyResponse;
use crate::schema::{favorites, leads, properties};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub listing_type: String,
    pub price: i64,
    pub address: String,
    pub city: String,
    pub state: String,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<i16>,
    pub square_feet: Option<i64>,
    pub amenities: Option<Value>,
    pub images: Option<Value>,
    pub highlights: Option<Value>,
    pub specifications: Option<Value>,
    pub nearby_locations: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<String>,
    pub price: Option<i64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<i16>,
    pub square_feet: Option<i64>,
    pub amenities: Option<Value>,
    pub images: Option<Value>,
    pub highlights: Option<Value>,
    pub specifications: Option<Value>,
    pub nearby_locations: Option<Value>,
}

fn encode_json_column(value: Option<Value>) -> String {
    value.unwrap_or_else(|| Value::Array(vec![])).to_string()
}

/// New listings always enter the approval queue as pending.
pub async fn create_property(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreatePropertyRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    current.require_role(&[Role::Builder])?;

    if payload.title.trim().is_empty()
        || payload.description.trim().is_empty()
        || payload.address.trim().is_empty()
        || payload.city.trim().is_empty()
        || payload.state.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "title, description, address, city and state are required".to_string(),
        ));
    }
    if payload.price <= 0 {
        return Err(ApiError::Validation("price must be positive".to_string()));
    }
    let listing_type = ListingType::parse(&payload.listing_type)
        .ok_or_else(|| ApiError::Validation("listing type must be sell, rent or lease".to_string()))?;

    let now = Utc::now().naive_utc();
    let property = Property {
        id: Uuid::new_v4().to_string(),
        builder_id: current.id.clone(),
        title: payload.title.trim().to_string(),
        description: payload.description.trim().to_string(),
        property_type: payload.property_type.trim().to_string(),
        listing_type: listing_type.as_str().to_string(),
        price: payload.price,
        address: payload.address.trim().to_string(),
        city: payload.city.trim().to_string(),
        state: payload.state.trim().to_string(),
        bedrooms: payload.bedrooms.unwrap_or(0),
        bathrooms: payload.bathrooms.unwrap_or(0),
        square_feet: payload.square_feet.unwrap_or(0),
        amenities: encode_json_column(payload.amenities),
        images: encode_json_column(payload.images),
        highlights: encode_json_column(payload.highlights),
        specifications: encode_json_column(payload.specifications),
        nearby_locations: encode_json_column(payload.nearby_locations),
        approval_status: ApprovalStatus::Pending.as_str().to_string(),
        rejection_reason: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let conn = &mut state.db()?;
    diesel::insert_into(properties::table)
        .values(&property)
        .execute(conn)?;
    info!("builder {} submitted property {}", current.id, property.id);

    Ok(Json(property.into()))
}

pub async fn list_own_properties(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<PropertyResponse>>, ApiError> {
    current.require_role(&[Role::Builder])?;
    let conn = &mut state.db()?;

    let items: Vec<Property> = properties::table
        .filter(properties::builder_id.eq(current.id.as_str()))
        .order(properties::created_at.desc())
        .load(conn)?;

    Ok(Json(items.into_iter().map(PropertyResponse::from).collect()))
}

pub async fn get_own_property(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<PropertyResponse>, ApiError> {
    current.require_role(&[Role::Builder])?;
    let conn = &mut state.db()?;

    let property: Property = properties::table
        .find(id.as_str())
        .filter(properties::builder_id.eq(current.id.as_str()))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("property not found".to_string()))?;

    Ok(Json(property.into()))
}

fn owned_property(
    conn: &mut crate::db::DbConn,
    id: &str,
    builder_id: &str,
) -> Result<Property, ApiError> {
    let property: Property = properties::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("property not found".to_string()))?;
    if property.builder_id != builder_id {
        return Err(ApiError::Forbidden(
            "property belongs to another builder".to_string(),
        ));
    }
    Ok(property)
}

/// Edits resubmit the listing: approval status returns to pending and any
/// rejection reason is cleared.
pub async fn update_property(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePropertyRequest>,
) -> Result<Json<PropertyResponse>, ApiError> {
    current.require_role(&[Role::Builder])?;
    let conn = &mut state.db()?;
    let existing = owned_property(conn, &id, &current.id)?;

    let listing_type = match payload.listing_type.as_deref() {
        Some(raw) => ListingType::parse(raw)
            .ok_or_else(|| ApiError::Validation("listing type must be sell, rent or lease".to_string()))?
            .as_str()
            .to_string(),
        None => existing.listing_type.clone(),
    };
    if let Some(price) = payload.price {
        if price <= 0 {
            return Err(ApiError::Validation("price must be positive".to_string()));
        }
    }

    let now = Utc::now().naive_utc();
    diesel::update(properties::table.find(id.as_str()))
        .set((
            properties::title.eq(payload.title.unwrap_or(existing.title)),
            properties::description.eq(payload.description.unwrap_or(existing.description)),
            properties::property_type.eq(payload.property_type.unwrap_or(existing.property_type)),
            properties::listing_type.eq(listing_type),
            properties::price.eq(payload.price.unwrap_or(existing.price)),
            properties::address.eq(payload.address.unwrap_or(existing.address)),
            properties::city.eq(payload.city.unwrap_or(existing.city)),
            properties::state.eq(payload.state.unwrap_or(existing.state)),
            properties::bedrooms.eq(payload.bedrooms.unwrap_or(existing.bedrooms)),
            properties::bathrooms.eq(payload.bathrooms.unwrap_or(existing.bathrooms)),
            properties::square_feet.eq(payload.square_feet.unwrap_or(existing.square_feet)),
            properties::amenities
                .eq(payload.amenities.map(|v| v.to_string()).unwrap_or(existing.amenities)),
            properties::images
                .eq(payload.images.map(|v| v.to_string()).unwrap_or(existing.images)),
            properties::highlights
                .eq(payload.highlights.map(|v| v.to_string()).unwrap_or(existing.highlights)),
            properties::specifications.eq(payload
                .specifications
                .map(|v| v.to_string())
                .unwrap_or(existing.specifications)),
            properties::nearby_locations.eq(payload
                .nearby_locations
                .map(|v| v.to_string())
                .unwrap_or(existing.nearby_locations)),
            properties::approval_status.eq(ApprovalStatus::Pending.as_str()),
            properties::rejection_reason.eq(None::<String>),
            properties::updated_at.eq(now),
        ))
        .execute(conn)?;

    let property: Property = properties::table.find(id.as_str()).first(conn)?;
    info!("builder {} resubmitted property {}", current.id, id);
    Ok(Json(property.into()))
}

pub async fn delete_property(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(&[Role::Builder])?;
    let conn = &mut state.db()?;
    owned_property(conn, &id, &current.id)?;

    // Leads keep their contact history but no longer point at the removed
    // listing.
    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::delete(favorites::table.filter(favorites::property_id.eq(id.as_str())))
            .execute(conn)?;
        diesel::update(leads::table.filter(leads::property_id.eq(id.as_str())))
            .set(leads::property_id.eq(None::<String>))
            .execute(conn)?;
        diesel::delete(properties::table.find(id.as_str())).execute(conn)?;
        Ok(())
    })?;

    info!("builder {} deleted property {}", current.id, id);
    Ok(Json(json!({ "message": "property deleted" })))
}

/// Leads raised against any of the builder's own listings.
pub async fn list_property_leads(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    current.require_role(&[Role::Builder])?;
    let conn = &mut state.db()?;

    let own_ids = properties::table
        .filter(properties::builder_id.eq(current.id.as_str()))
        .select(properties::id.nullable());
    let items: Vec<Lead> = leads::table
        .filter(leads::property_id.eq_any(own_ids))
        .order(leads::created_at.desc())
        .load(conn)?;

    Ok(Json(items))
}
