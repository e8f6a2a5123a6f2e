use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_permission", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Admin,
    Editor,
    #[default]
    Viewer,
}

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                   // immutable after creation
    pub name: String,               // display name
    pub email: String,              // unique
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub password: String,           // opaque credential, empty once scrubbed
    pub permission: Permission,
    pub status: UserStatus,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Drop the credential before the record leaves a safe read path.
    pub fn scrubbed(mut self) -> Self {
        self.password.clear();
        self
    }
}

/// Canonical stored form of an email: trimmed and lowercased. Used on every
/// path that writes an email and on login lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input of `UserRepository::create`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub permission: Permission,
    #[serde(default)]
    pub status: UserStatus,
}

impl NewUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        permission: Permission,
    ) -> Self {
        let email: String = email.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: normalize_email(&email),
            password: password.into(),
            permission,
            status: UserStatus::Active,
        }
    }
}

/// Password rotation.
#[derive(Debug, Clone)]
pub struct UserUpdatePasswordParams {
    pub id: Uuid,
    pub password: String,
}

/// Profile update; never touches the credential or the email.
#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdateInfoParams {
    pub id: Uuid,
    pub name: String,
    pub permission: Permission,
}

/// Row inserted by `create_default_users`. A conflict on `id` keeps the existing row.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultUserSeed {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub status: UserStatus,
}
