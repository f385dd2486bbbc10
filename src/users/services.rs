use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use thiserror::Error;
use tracing::error;

use super::dto::{CreateUserRequest, ListQuery, PageMeta, UpdateUserRequest};

const MIN_PHONE_LEN: usize = 7;
const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name, email, and password are required.")]
    MissingRequired,
    #[error("Name must not be empty.")]
    EmptyName,
    #[error("Invalid email format.")]
    InvalidEmail,
    #[error("Invalid phone number format.")]
    InvalidPhone,
    #[error("Password must be at least 8 characters long.")]
    PasswordTooShort,
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// An empty phone counts as not supplied and is not checked.
fn is_valid_phone(phone: &str) -> bool {
    phone.is_empty() || phone.chars().count() >= MIN_PHONE_LEN
}

fn is_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// A creation request that passed every rule.
#[derive(Debug)]
pub struct ValidCreate {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
}

/// Checks a creation request; the first failing rule wins.
pub fn validate_create(req: CreateUserRequest) -> Result<ValidCreate, ValidationError> {
    let CreateUserRequest {
        name,
        email,
        password,
        phone,
        address,
        country,
    } = req;
    let (Some(name), Some(email), Some(password)) =
        (non_empty(name), non_empty(email), non_empty(password))
    else {
        return Err(ValidationError::MissingRequired);
    };
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }
    if matches!(&phone, Some(p) if !is_valid_phone(p)) {
        return Err(ValidationError::InvalidPhone);
    }
    if !is_long_enough(&password) {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(ValidCreate {
        name,
        email,
        password,
        phone,
        address,
        country,
    })
}

/// Applies the creation rules to whichever fields the update supplies.
pub fn validate_update(req: &UpdateUserRequest) -> Result<(), ValidationError> {
    if matches!(&req.name, Some(n) if n.is_empty()) {
        return Err(ValidationError::EmptyName);
    }
    if matches!(&req.email, Some(e) if !is_valid_email(e)) {
        return Err(ValidationError::InvalidEmail);
    }
    if matches!(&req.phone, Some(p) if !is_valid_phone(p)) {
        return Err(ValidationError::InvalidPhone);
    }
    if matches!(&req.password, Some(p) if !is_long_enough(p)) {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

#[cfg(test)]
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

fn positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v > 0)
}

impl PageRequest {
    pub fn from_query(q: &ListQuery) -> Self {
        Self {
            page: positive(q.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            limit: positive(q.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total_users: i64) -> PageMeta {
        let total_pages = if total_users > 0 {
            (total_users - 1) / self.limit + 1
        } else {
            0
        };
        PageMeta {
            total_users,
            total_pages,
            current_page: self.page,
            page_size: self.limit,
            next_page: (self.page < total_pages).then(|| self.page + 1),
            prev_page: (self.page > 1).then(|| self.page - 1),
        }
    }
}
