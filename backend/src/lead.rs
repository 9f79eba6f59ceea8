use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::{Lead, LeadStatus, Role};
use crate::schema::leads;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

fn can_update(role: Role, assigned_to: Option<&str>, user_id: &str) -> bool {
    match role {
        Role::Admin | Role::SuperAdmin => true,
        Role::Telecaller | Role::SalesExecutive => assigned_to == Some(user_id),
        Role::Buyer | Role::Builder => false,
    }
}

/// Telecallers and sales executives see the leads assigned to them; admins
/// see everything.
pub async fn list_assigned(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    let conn = &mut state.db()?;

    let items: Vec<Lead> = match current.role {
        Role::Admin | Role::SuperAdmin => {
            leads::table.order(leads::created_at.desc()).load(conn)?
        }
        Role::Telecaller | Role::SalesExecutive => leads::table
            .filter(leads::assigned_to.eq(current.id.as_str()))
            .order(leads::created_at.desc())
            .load(conn)?,
        _ => {
            return Err(ApiError::Forbidden(
                "insufficient permissions for this resource".to_string(),
            ))
        }
    };

    Ok(Json(items))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let status = LeadStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::Validation("unknown lead status".to_string()))?;

    let conn = &mut state.db()?;
    let lead: Lead = leads::table
        .find(id.as_str())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("lead not found".to_string()))?;

    if !can_update(current.role, lead.assigned_to.as_deref(), &current.id) {
        return Err(ApiError::Forbidden(
            "lead is not assigned to you".to_string(),
        ));
    }

    diesel::update(leads::table.find(id.as_str()))
        .set((
            leads::status.eq(status.as_str()),
            leads::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!("lead {} moved to {} by {}", id, status.as_str(), current.id);
    Ok(Json(json!({ "message": "lead updated" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_update_any_lead() {
        assert!(can_update(Role::Admin, None, "u1"));
        assert!(can_update(Role::SuperAdmin, Some("u2"), "u1"));
    }

    #[test]
    fn staff_update_only_their_assignments() {
        assert!(can_update(Role::Telecaller, Some("u1"), "u1"));
        assert!(!can_update(Role::Telecaller, Some("u2"), "u1"));
        assert!(!can_update(Role::SalesExecutive, None, "u1"));
    }

    #[test]
    fn buyers_and_builders_never_update_leads() {
        assert!(!can_update(Role::Buyer, Some("u1"), "u1"));
        assert!(!can_update(Role::Builder, Some("u1"), "u1"));
    }
}
