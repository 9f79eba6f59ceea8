use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::{ApprovalStatus, Lead, LeadStatus, Property, Role, User};
use crate::property::PropertyResponse;
use crate::schema::{leads, properties, users};
use crate::state::AppState;

const REVIEW_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

#[derive(Deserialize)]
pub struct SubmissionQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct LeadQuery {
    pub status: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub user_id: String,
}

/// Submission queue, defaulting to listings awaiting review.
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<SubmissionQuery>,
) -> Result<Json<Vec<PropertyResponse>>, ApiError> {
    current.require_role(REVIEW_ROLES)?;

    let status = match params.status.as_deref() {
        Some(raw) => ApprovalStatus::parse(raw)
            .ok_or_else(|| ApiError::Validation("unknown approval status".to_string()))?,
        None => ApprovalStatus::Pending,
    };

    let conn = &mut state.db()?;
    let items: Vec<Property> = properties::table
        .filter(properties::approval_status.eq(status.as_str()))
        .order(properties::created_at.desc())
        .load(conn)?;

    Ok(Json(items.into_iter().map(PropertyResponse::from).collect()))
}

fn pending_submission(
    conn: &mut crate::db::DbConn,
    id: &str,
) -> Result<Property, ApiError> {
    let property: Property = properties::table
        .find(id)
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("property not found".to_string()))?;
    if property.approval_status != ApprovalStatus::Pending.as_str() {
        return Err(ApiError::Conflict(
            "listing has already been reviewed".to_string(),
        ));
    }
    Ok(property)
}

pub async fn approve_property(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(REVIEW_ROLES)?;
    let conn = &mut state.db()?;
    pending_submission(conn, &id)?;

    diesel::update(properties::table.find(id.as_str()))
        .set((
            properties::approval_status.eq(ApprovalStatus::Approved.as_str()),
            properties::rejection_reason.eq(None::<String>),
            properties::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!("property {} approved by {}", id, current.id);
    Ok(Json(json!({ "message": "listing approved" })))
}

pub async fn reject_property(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(REVIEW_ROLES)?;
    let reason = payload.reason.trim().to_string();
    if reason.is_empty() {
        return Err(ApiError::Validation("a rejection reason is required".to_string()));
    }

    let conn = &mut state.db()?;
    pending_submission(conn, &id)?;

    diesel::update(properties::table.find(id.as_str()))
        .set((
            properties::approval_status.eq(ApprovalStatus::Rejected.as_str()),
            properties::rejection_reason.eq(reason.as_str()),
            properties::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!("property {} rejected by {}", id, current.id);
    Ok(Json(json!({ "message": "listing rejected" })))
}

pub async fn list_leads(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<LeadQuery>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    current.require_role(REVIEW_ROLES)?;

    let mut query = leads::table.into_boxed();
    if let Some(raw) = params.status.as_deref() {
        let status = LeadStatus::parse(raw)
            .ok_or_else(|| ApiError::Validation("unknown lead status".to_string()))?;
        query = query.filter(leads::status.eq(status.as_str()));
    }
    if let Some(assignee) = params.assigned_to.as_deref() {
        query = query.filter(leads::assigned_to.eq(assignee.to_string()));
    }

    let conn = &mut state.db()?;
    let items: Vec<Lead> = query.order(leads::created_at.desc()).load(conn)?;
    Ok(Json(items))
}

/// Hands a lead to a telecaller or sales executive for follow-up.
pub async fn assign_lead(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(REVIEW_ROLES)?;
    let conn = &mut state.db()?;

    let lead_exists: i64 = leads::table.find(id.as_str()).count().get_result(conn)?;
    if lead_exists == 0 {
        return Err(ApiError::NotFound("lead not found".to_string()));
    }

    let assignee: Option<User> = users::table
        .find(payload.user_id.as_str())
        .first(conn)
        .optional()?;
    let valid = assignee
        .as_ref()
        .map(|u| {
            u.is_active
                && matches!(
                    Role::parse(&u.role),
                    Some(Role::Telecaller | Role::SalesExecutive)
                )
        })
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::Validation(
            "assignee must be an active telecaller or sales executive".to_string(),
        ));
    }

    diesel::update(leads::table.find(id.as_str()))
        .set((
            leads::assigned_to.eq(payload.user_id.as_str()),
            leads::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!("lead {} assigned to {} by {}", id, payload.user_id, current.id);
    Ok(Json(json!({ "message": "lead assigned" })))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    current.require_role(REVIEW_ROLES)?;

    let mut query = users::table.into_boxed();
    if let Some(raw) = params.role.as_deref() {
        let role = Role::parse(raw)
            .ok_or_else(|| ApiError::Validation("unknown role".to_string()))?;
        query = query.filter(users::role.eq(role.as_str()));
    }

    let conn = &mut state.db()?;
    let items: Vec<User> = query.order(users::created_at.desc()).load(conn)?;
    Ok(Json(items))
}
