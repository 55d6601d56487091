use crate::error::AgriResult;
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const SANITIZE_MAX_LENGTH: usize = 1000;
const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+91|91|0)?[6-9]\d{9}$").expect("phone pattern compiles"));

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Indian mobile numbers, with or without the +91/91/0 prefix.
pub fn validate_phone(phone: &str) -> bool {
    let cleaned: String = phone.chars().filter(|c| *c != ' ' && *c != '-').collect();
    PHONE_RE.is_match(&cleaned)
}

/// Returns the first rule the password breaks.
pub fn password_problem(password: &str) -> Option<String> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Some(format!("Password must be at least {} characters", PASSWORD_MIN_LENGTH));
    }
    if !password.chars().any(char::is_uppercase) {
        return Some("Password must contain at least one uppercase letter".into());
    }
    if !password.chars().any(char::is_lowercase) {
        return Some("Password must contain at least one lowercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain at least one digit".into());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Some("Password must contain at least one special character".into());
    }
    None
}

pub fn validate_full_name(name: &str) -> bool {
    let len = name.trim().chars().count();
    (2..=100).contains(&len)
}

pub fn sanitize_input(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().take(SANITIZE_MAX_LENGTH) {
        match c {
            '\0' => {}
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out.trim().to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrationPayload {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationCheck {
    pub valid: bool,
    pub errors: BTreeMap<String, String>,
    pub sanitized_full_name: Option<String>,
}

pub fn check_registration(payload: &RegistrationPayload) -> RegistrationCheck {
    let mut errors = BTreeMap::new();

    match payload.email.as_deref() {
        Some(email) if validate_email(email.trim()) => {}
        Some(_) => {
            errors.insert("email".to_string(), "Invalid email format".to_string());
        }
        None => {
            errors.insert("email".to_string(), "Email is required".to_string());
        }
    }

    if let Some(phone) = payload.phone.as_deref() {
        if !validate_phone(phone) {
            errors.insert("phone".to_string(), "Invalid Indian phone number".to_string());
        }
    }

    match payload.password.as_deref() {
        Some(password) => {
            if let Some(problem) = password_problem(password) {
                errors.insert("password".to_string(), problem);
            }
        }
        None => {
            errors.insert("password".to_string(), "Password is required".to_string());
        }
    }

    match payload.full_name.as_deref() {
        Some(name) if validate_full_name(name) => {}
        _ => {
            errors.insert(
                "full_name".to_string(),
                "Full name must be between 2 and 100 characters".to_string(),
            );
        }
    }

    RegistrationCheck {
        valid: errors.is_empty(),
        errors,
        sanitized_full_name: payload.full_name.as_deref().map(sanitize_input),
    }
}

pub async fn validate_registration_axum(
    Json(payload): Json<RegistrationPayload>,
) -> AgriResult<Json<RegistrationCheck>> {
    Ok(Json(check_registration(&payload)))
}
