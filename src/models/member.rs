//! Member model and related types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").expect("valid phone regex"));

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone_format"))
    }
}

/// Library member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom(function = "validate_phone", message = "Invalid phone number"))]
    pub phone: String,
}

/// Partial member update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone", message = "Invalid phone number"))]
    pub phone: Option<String>,
}

impl UpdateMember {
    pub fn apply_to(&self, member: &mut Member) {
        if let Some(ref name) = self.name {
            member.name = name.clone();
        }
        if let Some(ref email) = self.email {
            member.email = email.clone();
        }
        if let Some(ref phone) = self.phone {
            member.phone = phone.clone();
        }
    }
}
