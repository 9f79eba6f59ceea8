use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::mysql::Mysql;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{ApprovalStatus, Lead, LeadStatus, ListingType, Property};
use crate::schema::{leads, properties};
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE: i64 = 10_000;

#[derive(Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub listing_type: Option<String>,
    pub city: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i16>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Listing shape served to clients: the JSON-text columns are decoded into
/// real arrays/objects.
#[derive(Serialize)]
pub struct PropertyResponse {
    pub id: String,
    pub builder_id: String,
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub listing_type: String,
    pub price: i64,
    pub address: String,
    pub city: String,
    pub state: String,
    pub bedrooms: i16,
    pub bathrooms: i16,
    pub square_feet: i64,
    pub amenities: Value,
    pub images: Value,
    pub highlights: Value,
    pub specifications: Value,
    pub nearby_locations: Value,
    pub approval_status: String,
    pub rejection_reason: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A malformed stored blob degrades to an empty array rather than a 500.
fn decode_json_column(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Array(vec![]))
}

impl From<Property> for PropertyResponse {
    fn from(p: Property) -> Self {
        PropertyResponse {
            amenities: decode_json_column(&p.amenities),
            images: decode_json_column(&p.images),
            highlights: decode_json_column(&p.highlights),
            specifications: decode_json_column(&p.specifications),
            nearby_locations: decode_json_column(&p.nearby_locations),
            id: p.id,
            builder_id: p.builder_id,
            title: p.title,
            description: p.description,
            property_type: p.property_type,
            listing_type: p.listing_type,
            price: p.price,
            address: p.address,
            city: p.city,
            state: p.state,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            square_feet: p.square_feet,
            approval_status: p.approval_status,
            rejection_reason: p.rejection_reason,
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Both bounds are clamped: the offset is `(page - 1) * per_page`, so an
/// unclamped page from the query string would overflow the multiplication.
pub fn page_bounds(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, per_page)
}

/// Approved-and-active listings with the public search filters applied.
fn visible_listings(params: &ListQuery) -> Result<properties::BoxedQuery<'static, Mysql>, ApiError> {
    let mut query = properties::table
        .into_boxed()
        .filter(properties::approval_status.eq(ApprovalStatus::Approved.as_str()))
        .filter(properties::is_active.eq(true));

    if let Some(raw) = params.listing_type.as_deref() {
        let listing_type = ListingType::parse(raw)
            .ok_or_else(|| ApiError::Validation("unknown listing type".to_string()))?;
        query = query.filter(properties::listing_type.eq(listing_type.as_str()));
    }
    if let Some(city) = params.city.as_deref() {
        query = query.filter(properties::city.eq(city.to_string()));
    }
    if let Some(min) = params.min_price {
        query = query.filter(properties::price.ge(min));
    }
    if let Some(max) = params.max_price {
        query = query.filter(properties::price.le(max));
    }
    if let Some(bedrooms) = params.bedrooms {
        query = query.filter(properties::bedrooms.ge(bedrooms));
    }
    if let Some(q) = params.q.as_deref() {
        let pattern = format!("%{}%", q.trim());
        query = query.filter(
            properties::title
                .like(pattern.clone())
                .or(properties::city.like(pattern)),
        );
    }

    Ok(query)
}

/// Public search over approved listings, newest first.
pub async fn list_properties(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let (page, per_page) = page_bounds(params.page, params.per_page);
    let conn = &mut state.db()?;

    let total: i64 = visible_listings(&params)?.count().get_result(conn)?;
    let items: Vec<Property> = visible_listings(&params)?
        .order(properties::created_at.desc())
        .offset((page - 1) * per_page)
        .limit(per_page)
        .load(conn)?;
    let items: Vec<PropertyResponse> = items.into_iter().map(PropertyResponse::from).collect();

    Ok(Json(json!({
        "items": items,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PropertyResponse>, ApiError> {
    let conn = &mut state.db()?;
    let property: Property = properties::table
        .find(id.as_str())
        .filter(properties::approval_status.eq(ApprovalStatus::Approved.as_str()))
        .filter(properties::is_active.eq(true))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("property not found".to_string()))?;
    Ok(Json(property.into()))
}

#[derive(Deserialize)]
pub struct InquiryRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

/// Public inquiry form; records a lead against the listing.
pub async fn create_inquiry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<InquiryRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.phone.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "name, email and phone are required".to_string(),
        ));
    }

    let conn = &mut state.db()?;
    let visible: i64 = properties::table
        .find(id.as_str())
        .filter(properties::approval_status.eq(ApprovalStatus::Approved.as_str()))
        .filter(properties::is_active.eq(true))
        .count()
        .get_result(conn)?;
    if visible == 0 {
        return Err(ApiError::NotFound("property not found".to_string()));
    }

    let now = Utc::now().naive_utc();
    let lead = Lead {
        id: Uuid::new_v4().to_string(),
        property_id: Some(id.clone()),
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        phone: payload.phone.trim().to_string(),
        message: payload.message.trim().to_string(),
        status: LeadStatus::New.as_str().to_string(),
        assigned_to: None,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(leads::table).values(&lead).execute(conn)?;
    info!("inquiry recorded for property {}", id);

    Ok(Json(json!({ "message": "inquiry received" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_clamp_out_of_range_values() {
        assert_eq!(page_bounds(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(page_bounds(Some(0), Some(0)), (1, 1));
        assert_eq!(page_bounds(Some(-3), Some(1000)), (1, MAX_PAGE_SIZE));
        assert_eq!(page_bounds(Some(4), Some(20)), (4, 20));
        assert_eq!(page_bounds(Some(i64::MAX), None), (MAX_PAGE, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn offset_cannot_overflow_for_any_page_value() {
        let (page, per_page) = page_bounds(Some(i64::MAX), Some(i64::MAX));
        let offset = (page - 1) * per_page;
        assert_eq!(offset, (MAX_PAGE - 1) * MAX_PAGE_SIZE);
    }

    #[test]
    fn malformed_json_columns_degrade_to_empty_array() {
        assert_eq!(decode_json_column("not json"), Value::Array(vec![]));
        assert_eq!(
            decode_json_column(r#"["pool","gym"]"#),
            json!(["pool", "gym"])
        );
    }
}
