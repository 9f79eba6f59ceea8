use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{favorites, leads, pending_users, properties, transactions, users};

/// Account roles. Staff roles (admin, telecaller, sales-executive) carry a
/// security key checked at login in addition to the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Buyer,
    Builder,
    Admin,
    SuperAdmin,
    Telecaller,
    SalesExecutive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Builder => "builder",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
            Role::Telecaller => "telecaller",
            Role::SalesExecutive => "sales-executive",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "buyer" => Some(Role::Buyer),
            "builder" => Some(Role::Builder),
            "admin" => Some(Role::Admin),
            "super-admin" => Some(Role::SuperAdmin),
            "telecaller" => Some(Role::Telecaller),
            "sales-executive" => Some(Role::SalesExecutive),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Telecaller | Role::SalesExecutive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingType {
    Sell,
    Rent,
    Lease,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Sell => "sell",
            ListingType::Rent => "rent",
            ListingType::Lease => "lease",
        }
    }

    pub fn parse(s: &str) -> Option<ListingType> {
        match s {
            "sell" => Some(ListingType::Sell),
            "rent" => Some(ListingType::Rent),
            "lease" => Some(ListingType::Lease),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<ApprovalStatus> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    New,
    Contacted,
    SiteVisit,
    Negotiation,
    Closed,
    Dropped,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::SiteVisit => "site-visit",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Closed => "closed",
            LeadStatus::Dropped => "dropped",
        }
    }

    pub fn parse(s: &str) -> Option<LeadStatus> {
        match s {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "site-visit" => Some(LeadStatus::SiteVisit),
            "negotiation" => Some(LeadStatus::Negotiation),
            "closed" => Some(LeadStatus::Closed),
            "dropped" => Some(LeadStatus::Dropped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Credit,
    Debit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<EntryKind> {
        match s {
            "credit" => Some(EntryKind::Credit),
            "debit" => Some(EntryKind::Debit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub security_key: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Staging row for registration and password-reset OTP flows, keyed by
/// (email, purpose). Deleted on successful verification.
#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = pending_users)]
pub struct PendingUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
    pub purpose: String,
    pub otp_code: String,
    pub otp_expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

pub const PURPOSE_REGISTER: &str = "register";
pub const PURPOSE_RESET: &str = "reset";

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = properties)]
pub struct Property {
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
    pub amenities: String,
    pub images: String,
    pub highlights: String,
    pub specifications: String,
    pub nearby_locations: String,
    pub approval_status: String,
    pub rejection_reason: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = favorites)]
pub struct Favorite {
    pub id: String,
    pub user_id: String,
    pub property_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = leads)]
pub struct Lead {
    pub id: String,
    pub property_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub status: String,
    pub assigned_to: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = transactions)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub property_id: Option<String>,
    pub amount: i64,
    pub entry_kind: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [
            Role::Buyer,
            Role::Builder,
            Role::Admin,
            Role::SuperAdmin,
            Role::Telecaller,
            Role::SalesExecutive,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superadmin"), None);
    }

    #[test]
    fn staff_roles_require_security_key() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Telecaller.is_staff());
        assert!(Role::SalesExecutive.is_staff());
        assert!(!Role::Buyer.is_staff());
        assert!(!Role::Builder.is_staff());
        assert!(!Role::SuperAdmin.is_staff());
    }

    #[test]
    fn listing_and_approval_enums_reject_unknown_values() {
        assert_eq!(ListingType::parse("rent"), Some(ListingType::Rent));
        assert_eq!(ListingType::parse("auction"), None);
        assert_eq!(ApprovalStatus::parse("approved"), Some(ApprovalStatus::Approved));
        assert_eq!(ApprovalStatus::parse("live"), None);
    }

    #[test]
    fn lead_status_uses_kebab_case() {
        assert_eq!(LeadStatus::SiteVisit.as_str(), "site-visit");
        assert_eq!(LeadStatus::parse("site-visit"), Some(LeadStatus::SiteVisit));
        assert_eq!(LeadStatus::parse("site_visit"), None);
    }
}
