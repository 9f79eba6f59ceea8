use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use diesel::dsl::count_star;
use diesel::mysql::Mysql;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, CurrentUser};
use crate::error::ApiError;
use crate::models::{EntryKind, Role, Transaction, User};
use crate::schema::{leads, properties, transactions, users};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: String,
    pub security_key: String,
}

#[derive(Deserialize)]
pub struct UserStatusRequest {
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct LedgerQuery {
    pub user_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTransactionRequest {
    pub user_id: String,
    pub property_id: Option<String>,
    pub amount: i64,
    pub entry_kind: String,
    pub description: String,
}

/// Staff accounts (admin, telecaller, sales executive) are provisioned here
/// with their login security key.
pub async fn create_staff(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateStaffRequest>,
) -> Result<Json<User>, ApiError> {
    current.require_role(&[Role::SuperAdmin])?;

    let role = Role::parse(&payload.role)
        .filter(Role::is_staff)
        .ok_or_else(|| {
            ApiError::Validation(
                "role must be admin, telecaller or sales-executive".to_string(),
            )
        })?;
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".to_string()));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    if payload.security_key.trim().is_empty() {
        return Err(ApiError::Validation("a security key is required".to_string()));
    }

    let conn = &mut state.db()?;
    let taken: i64 = users::table
        .filter(users::email.eq(email.as_str()))
        .count()
        .get_result(conn)?;
    if taken > 0 {
        return Err(ApiError::Conflict("email is already registered".to_string()));
    }

    let now = Utc::now().naive_utc();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email,
        phone: payload.phone.trim().to_string(),
        password_hash: auth::hash_password(&payload.password)?,
        role: role.as_str().to_string(),
        security_key: Some(payload.security_key.trim().to_string()),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(users::table).values(&user).execute(conn)?;
    info!("staff account {} created ({})", user.email, user.role);

    Ok(Json(user))
}

pub async fn set_user_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UserStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(&[Role::SuperAdmin])?;
    if id == current.id && !payload.is_active {
        return Err(ApiError::Validation(
            "cannot disable your own account".to_string(),
        ));
    }

    let conn = &mut state.db()?;
    let updated = diesel::update(users::table.find(id.as_str()))
        .set((
            users::is_active.eq(payload.is_active),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    if updated == 0 {
        return Err(ApiError::NotFound("user not found".to_string()));
    }

    info!("user {} set active={}", id, payload.is_active);
    Ok(Json(json!({ "message": "account updated" })))
}

fn parse_day(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("dates must be YYYY-MM-DD".to_string()))
}

fn ledger_entries(params: &LedgerQuery) -> Result<transactions::BoxedQuery<'static, Mysql>, ApiError> {
    let mut query = transactions::table.into_boxed();
    if let Some(user_id) = params.user_id.as_deref() {
        query = query.filter(transactions::user_id.eq(user_id.to_string()));
    }
    if let Some(raw) = params.from.as_deref() {
        let day = parse_day(raw)?;
        let start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ApiError::Validation("dates must be YYYY-MM-DD".to_string()))?;
        query = query.filter(transactions::created_at.ge(start));
    }
    if let Some(raw) = params.to.as_deref() {
        let day = parse_day(raw)?;
        let end = day
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| ApiError::Validation("dates must be YYYY-MM-DD".to_string()))?;
        query = query.filter(transactions::created_at.le(end));
    }
    Ok(query)
}

fn ledger_totals(rows: &[Transaction]) -> (i64, i64) {
    let credit: i64 = rows
        .iter()
        .filter(|t| t.entry_kind == EntryKind::Credit.as_str())
        .map(|t| t.amount)
        .sum();
    let debit: i64 = rows
        .iter()
        .filter(|t| t.entry_kind == EntryKind::Debit.as_str())
        .map(|t| t.amount)
        .sum();
    (credit, debit)
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<LedgerQuery>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(&[Role::SuperAdmin])?;
    let conn = &mut state.db()?;

    let items: Vec<Transaction> = ledger_entries(&params)?
        .order(transactions::created_at.desc())
        .load(conn)?;
    let (credit, debit) = ledger_totals(&items);

    Ok(Json(json!({
        "items": items,
        "totals": { "credit": credit, "debit": debit, "net": credit - debit },
    })))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    current.require_role(&[Role::SuperAdmin])?;

    if payload.amount <= 0 {
        return Err(ApiError::Validation("amount must be positive".to_string()));
    }
    let kind = EntryKind::parse(&payload.entry_kind)
        .ok_or_else(|| ApiError::Validation("entry kind must be credit or debit".to_string()))?;

    let conn = &mut state.db()?;
    let known: i64 = users::table
        .find(payload.user_id.as_str())
        .count()
        .get_result(conn)?;
    if known == 0 {
        return Err(ApiError::Validation("unknown user".to_string()));
    }

    let entry = Transaction {
        id: Uuid::new_v4().to_string(),
        user_id: payload.user_id,
        property_id: payload.property_id,
        amount: payload.amount,
        entry_kind: kind.as_str().to_string(),
        description: payload.description.trim().to_string(),
        created_at: Utc::now().naive_utc(),
    };
    diesel::insert_into(transactions::table)
        .values(&entry)
        .execute(conn)?;

    info!("ledger entry {} recorded by {}", entry.id, current.id);
    Ok(Json(entry))
}

fn transactions_csv(rows: &[Transaction]) -> Result<String, ApiError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record([
            "id",
            "user_id",
            "property_id",
            "amount",
            "entry_kind",
            "description",
            "created_at",
        ])
        .map_err(|e| ApiError::Internal(format!("csv write failed: {}", e)))?;
    for row in rows {
        writer
            .write_record([
                row.id.as_str(),
                row.user_id.as_str(),
                row.property_id.as_deref().unwrap_or(""),
                &row.amount.to_string(),
                row.entry_kind.as_str(),
                row.description.as_str(),
                &row.created_at.to_string(),
            ])
            .map_err(|e| ApiError::Internal(format!("csv write failed: {}", e)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("csv write failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ApiError::Internal(format!("csv encoding failed: {}", e)))
}

pub async fn export_transactions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<LedgerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    current.require_role(&[Role::SuperAdmin])?;
    let conn = &mut state.db()?;

    let items: Vec<Transaction> = ledger_entries(&params)?
        .order(transactions::created_at.desc())
        .load(conn)?;
    let body = transactions_csv(&items)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"transactions.csv\"",
            ),
        ],
        body,
    ))
}

fn counts_to_object(rows: Vec<(String, i64)>) -> Value {
    let mut object = Map::new();
    for (key, count) in rows {
        object.insert(key, json!(count));
    }
    Value::Object(object)
}

/// Platform overview: users per role, listings per approval status, leads
/// per status.
pub async fn stats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    current.require_role(&[Role::SuperAdmin])?;
    let conn = &mut state.db()?;

    let users_by_role: Vec<(String, i64)> = users::table
        .group_by(users::role)
        .select((users::role, count_star()))
        .load(conn)?;
    let properties_by_status: Vec<(String, i64)> = properties::table
        .group_by(properties::approval_status)
        .select((properties::approval_status, count_star()))
        .load(conn)?;
    let leads_by_status: Vec<(String, i64)> = leads::table
        .group_by(leads::status)
        .select((leads::status, count_star()))
        .load(conn)?;

    Ok(Json(json!({
        "users": counts_to_object(users_by_role),
        "properties": counts_to_object(properties_by_status),
        "leads": counts_to_object(leads_by_status),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn entry(kind: EntryKind, amount: i64) -> Transaction {
        Transaction {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            property_id: None,
            amount,
            entry_kind: kind.as_str().to_string(),
            description: "test".to_string(),
            created_at: NaiveDateTime::parse_from_str("2025-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
        }
    }

    #[test]
    fn totals_split_credits_and_debits() {
        let rows = vec![
            entry(EntryKind::Credit, 500),
            entry(EntryKind::Credit, 250),
            entry(EntryKind::Debit, 100),
        ];
        assert_eq!(ledger_totals(&rows), (750, 100));
    }

    #[test]
    fn csv_has_header_and_one_line_per_entry() {
        let rows = vec![entry(EntryKind::Credit, 500), entry(EntryKind::Debit, 42)];
        let body = transactions_csv(&rows).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,user_id,property_id,amount"));
        assert!(lines[1].contains("500"));
        assert!(lines[2].contains("debit"));
    }

    #[test]
    fn report_dates_must_be_iso() {
        assert!(parse_day("2025-02-30").is_err());
        assert!(parse_day("01/02/2025").is_err());
        assert!(parse_day("2025-02-28").is_ok());
    }
}
