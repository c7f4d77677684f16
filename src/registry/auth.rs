use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Session, User, UserProfile};
use crate::registry::require;
use crate::state::AppState;

const MIN_RESET_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9a-z._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,64}$").expect("valid email regex")
});

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn register(state: &AppState, input: Registration) -> Result<(Session, UserProfile), AppError> {
    require("name", &input.name)?;
    require("email", &input.email)?;
    require("password", &input.password)?;
    require("password confirmation", &input.confirm_password)?;

    if input.password != input.confirm_password {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }
    if !is_valid_email(&input.email) {
        return Err(AppError::Validation("invalid email address".to_string()));
    }

    let password_hash = hash_password(state, &input.password)?;

    let guard = state.store.lock();
    if find_by_email(state, &input.email).is_some() {
        return Err(AppError::Conflict(format!(
            "a user with email {} already exists",
            input.email
        )));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: input.name,
        email: input.email,
        password_hash,
        phone: input.phone.filter(|phone| !phone.trim().is_empty()),
        reset_token: None,
        created_at: Utc::now(),
    };

    state.store.commit(&guard, &state.store.users, user.id, user.clone())?;
    drop(guard);
    info!(user_id = %user.id, "user registered");

    Ok((start_session(state, user.id), UserProfile::from(&user)))
}

pub fn login(state: &AppState, email: &str, password: &str) -> Result<(Session, UserProfile), AppError> {
    require("email", email)?;
    require("password", password)?;

    let invalid = || AppError::Unauthorized("invalid email or password".to_string());

    let user = find_by_email(state, email).ok_or_else(invalid)?;
    let matches = bcrypt::verify(password, &user.password_hash)
        .map_err(|err| AppError::Internal(format!("failed to verify password: {err}")))?;
    if !matches {
        warn!(user_id = %user.id, "login rejected");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    Ok((start_session(state, user.id), UserProfile::from(&user)))
}

pub fn logout(state: &AppState, token: Uuid) {
    if let Some((_, user_id)) = state.sessions.remove(&token) {
        info!(user_id = %user_id, "user logged out");
    }
}

/// Resolves a session token to a user id that still exists.
pub fn authenticate(state: &AppState, token: Uuid) -> Result<Uuid, AppError> {
    let user_id = state
        .sessions
        .get(&token)
        .map(|entry| *entry.value())
        .ok_or_else(|| AppError::Unauthorized("invalid or expired session".to_string()))?;

    if !state.store.users.contains_key(&user_id) {
        state.sessions.remove(&token);
        return Err(AppError::Unauthorized("invalid or expired session".to_string()));
    }
    Ok(user_id)
}

pub fn profile(state: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    let user = state
        .store
        .users
        .get(&user_id)
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?;
    Ok(UserProfile::from(user.value()))
}

/// Applies a non-empty `name` and any provided `phone`.
pub fn update_profile(
    state: &AppState,
    user_id: Uuid,
    name: Option<String>,
    phone: Option<String>,
) -> Result<UserProfile, AppError> {
    let guard = state.store.lock();
    let mut user = load(state, user_id)?;

    if let Some(name) = name.filter(|name| !name.trim().is_empty()) {
        user.name = name;
    }
    if let Some(phone) = phone {
        user.phone = Some(phone);
    }

    state.store.commit(&guard, &state.store.users, user.id, user.clone())?;
    Ok(UserProfile::from(&user))
}

/// Stores a fresh reset token on the user and returns it. Tokens do not expire.
pub fn initiate_password_reset(state: &AppState, email: &str) -> Result<String, AppError> {
    require("email", email)?;

    let guard = state.store.lock();
    let mut user = find_by_email(state, email)
        .ok_or_else(|| AppError::NotFound(format!("no user with email {email}")))?;

    let token = Uuid::new_v4().to_string();
    user.reset_token = Some(token.clone());
    state.store.commit(&guard, &state.store.users, user.id, user.clone())?;

    info!(user_id = %user.id, "password reset initiated");
    Ok(token)
}

pub fn reset_password(
    state: &AppState,
    email: &str,
    token: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), AppError> {
    if new_password != confirm_password {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }
    if new_password.chars().count() < MIN_RESET_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_RESET_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(state, new_password)?;

    let guard = state.store.lock();
    let mut user = find_by_email(state, email)
        .ok_or_else(|| AppError::NotFound(format!("no user with email {email}")))?;

    if user.reset_token.as_deref() != Some(token) {
        return Err(AppError::Validation("invalid or used reset token".to_string()));
    }

    user.password_hash = password_hash;
    user.reset_token = None;
    state.store.commit(&guard, &state.store.users, user.id, user.clone())?;

    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

fn find_by_email(state: &AppState, email: &str) -> Option<User> {
    state
        .store
        .users
        .iter()
        .find(|entry| entry.value().email == email)
        .map(|entry| entry.value().clone())
}

fn load(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .store
        .users
        .get(&user_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))
}

fn hash_password(state: &AppState, password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, state.bcrypt_cost)
        .map_err(|err| AppError::Internal(format!("failed to hash password: {err}")))
}

fn start_session(state: &AppState, user_id: Uuid) -> Session {
    let session = Session {
        token: Uuid::new_v4(),
        user_id,
    };
    state.sessions.insert(session.token, user_id);
    session
}
