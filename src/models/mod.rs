use serde::{Deserialize, Serialize};

/// Account role stored on the unified `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Ong,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Ong => "ong",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "ong" => Some(Role::Ong),
            _ => None,
        }
    }
}

/// Moderation state of an NGO profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pending,
    Validated,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Validated => "validated",
            ValidationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<ValidationStatus> {
        match s {
            "pending" => Some(ValidationStatus::Pending),
            "validated" => Some(ValidationStatus::Validated),
            "rejected" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }
}

/// Moderation state of a social case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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

/// Operational status of a case, independent of moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Ongoing,
    Resolved,
    Urgent,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Ongoing => "ongoing",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Urgent => "urgent",
        }
    }

    /// Accepts the stored tokens plus the French labels older forms still send.
    pub fn parse(s: &str) -> Option<CaseStatus> {
        match s {
            "ongoing" | "En cours" => Some(CaseStatus::Ongoing),
            "resolved" | "Résolu" | "Resolu" => Some(CaseStatus::Resolved),
            "urgent" | "Urgent" => Some(CaseStatus::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub must_change_password: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ong {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub domains: String,
    pub validation_status: ValidationStatus,
    pub logo_url: Option<String>,
    pub verification_doc_url: Option<String>,
    pub updated_at: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialCase {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub address: Option<String>,
    pub wilaya: Option<String>,
    pub moughataa: Option<String>,
    pub published_on: Option<String>,
    pub status: CaseStatus,
    pub approval_status: ApprovalStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ong_id: i64,
    pub category_id: Option<i64>,
    // Joined display names, present on read paths only.
    pub ong_name: Option<String>,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Beneficiary {
    pub id: i64,
    pub last_name: String,
    pub first_name: Option<String>,
    pub address: Option<String>,
    pub situation: Option<String>,
    pub case_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub id: i64,
    pub case_id: i64,
    pub file_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub id: i64,
    pub case_id: Option<i64>,
    pub message_fr: String,
    pub message_ar: String,
    pub created_at: Option<String>,
    pub is_read: bool,
}

/// One-shot message carried through the session between a redirect pair.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlashMessage {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

/// Field set for creating a case. Everything already sanitized by the caller.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub title: String,
    pub description: String,
    pub address: Option<String>,
    pub wilaya: Option<String>,
    pub moughataa: Option<String>,
    pub published_on: Option<String>,
    pub status: CaseStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ong_id: i64,
    pub category_id: Option<i64>,
}

/// Partial update for a case. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct CasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub wilaya: Option<String>,
    pub moughataa: Option<String>,
    pub published_on: Option<String>,
    pub status: Option<CaseStatus>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category_id: Option<i64>,
}

impl CasePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.address.is_none()
            && self.wilaya.is_none()
            && self.moughataa.is_none()
            && self.published_on.is_none()
            && self.status.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.category_id.is_none()
    }
}

/// Field set for registering an NGO profile.
#[derive(Debug, Clone)]
pub struct NewOng {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub domains: String,
    pub logo_url: Option<String>,
    pub verification_doc_url: Option<String>,
}

/// Outcome report of a cascading hard delete.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PurgeManifest {
    pub cases_deleted: usize,
    pub beneficiaries_deleted: usize,
    pub media_deleted: usize,
    pub notifications_deleted: usize,
    pub ongs_deleted: usize,
    pub accounts_deleted: usize,
    pub files_attempted: usize,
    pub files_failed: usize,
}

/// Filters applied to the public approved-case listing.
#[derive(Debug, Default, Clone)]
pub struct CaseFilter {
    pub category_id: Option<i64>,
    pub ong_id: Option<i64>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountByLabel {
    pub label: String,
    pub count: i64,
}

pub mod db_operations;
