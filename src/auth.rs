//! Local account authentication.
//!
//! Accounts are a `profiles` row plus an `accounts` row holding a PBKDF2
//! hash and salt. Signing in issues a random bearer token; only its SHA-256
//! digest is stored in `auth_sessions`. Password resets use the same
//! token scheme with a one-hour, single-use lifetime.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::{generate_token, hash_password, hash_token, verify_password, MIN_PASSWORD_LENGTH};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{Profile, Role};

const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const MAX_FAILED_LOGINS: u32 = 5;
const LOCKOUT_DURATION: StdDuration = StdDuration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Too many failed sign-in attempts. Try again in {retry_after_secs} seconds.")]
    LockedOut { retry_after_secs: u64 },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Reset link is invalid or has expired")]
    InvalidResetToken,

    #[error("Session is invalid or has expired")]
    InvalidSession,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(err))
    }
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Issued session. The token is returned once and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
}

/// Destination for password reset links.
pub trait ResetDelivery: Send + Sync {
    fn deliver(&self, email: &str, link: &str);
}

/// Default delivery: writes the link to the service log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

impl ResetDelivery for LogDelivery {
    fn deliver(&self, email: &str, link: &str) {
        tracing::info!(email = %email, link = %link, "Password reset link issued");
    }
}

// ═══════════════════════════════════════════════════════════
// Login lockout
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct FailedLogins {
    count: u32,
    last_failure: Option<Instant>,
    locked_until: Option<Instant>,
}

impl FailedLogins {
    // Unlocked and quiet for a full lockout period.
    fn is_stale(&self, now: Instant) -> bool {
        let lock_over = self.locked_until.map_or(true, |until| until <= now);
        let quiet = self
            .last_failure
            .map_or(true, |at| now.saturating_duration_since(at) >= LOCKOUT_DURATION);
        lock_over && quiet
    }
}

/// Per-email failed sign-in counter. Five consecutive failures lock the
/// email for five minutes.
#[derive(Debug, Default)]
pub struct LoginLockout {
    entries: Mutex<HashMap<String, FailedLogins>>,
}

impl LoginLockout {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Err(retry_after_secs)` while the email is locked.
    pub fn check(&self, email: &str, now: Instant) -> Result<(), u64> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&normalize_email(email)).and_then(|e| e.locked_until) {
            Some(until) if until > now => Err(until.duration_since(now).as_secs().max(1)),
            _ => Ok(()),
        }
    }

    pub fn record_failure(&self, email: &str, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(normalize_email(email)).or_default();
        if entry.locked_until.is_some_and(|until| until <= now) {
            *entry = FailedLogins::default();
        }
        entry.count += 1;
        entry.last_failure = Some(now);
        if entry.count >= MAX_FAILED_LOGINS {
            entry.locked_until = Some(now + LOCKOUT_DURATION);
        }
    }

    pub fn record_success(&self, email: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&normalize_email(email));
    }

    /// Forget expired locks and failure streaks that went quiet.
    /// Returns how many emails were dropped.
    pub fn prune(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(now));
        before - entries.len()
    }

    pub fn tracked(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ═══════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// Create an account. The first account on an empty database is an admin.
pub fn register(conn: &Connection, account: &NewAccount, now: DateTime<Utc>) -> Result<Profile, AuthError> {
    let email = account.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::Validation("A valid email address is required".into()));
    }
    if account.first_name.trim().is_empty() || account.last_name.trim().is_empty() {
        return Err(AuthError::Validation("First and last name are required".into()));
    }
    if account.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort);
    }

    let tx = conn.unchecked_transaction()?;
    if repository::find_profile_by_email(&tx, email)?.is_some() {
        return Err(AuthError::EmailTaken);
    }
    let role = if repository::count_profiles(&tx)? == 0 {
        Role::Admin
    } else {
        Role::Staff
    };

    let profile = Profile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: account.first_name.trim().to_string(),
        last_name: account.last_name.trim().to_string(),
        role,
        created_at: now,
    };
    let (hash, salt) = hash_password(&account.password);
    repository::insert_profile(&tx, &profile)?;
    repository::insert_account(&tx, &profile.id, hash.as_bytes(), &salt, &now)?;
    tx.commit()?;

    tracing::info!(user_id = %profile.id, role = %profile.role, "Account registered");
    Ok(profile)
}

pub fn sign_in(
    conn: &Connection,
    lockout: &LoginLockout,
    email: &str,
    password: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<SignedIn, AuthError> {
    let clock = Instant::now();
    if let Err(retry_after_secs) = lockout.check(email, clock) {
        return Err(AuthError::LockedOut { retry_after_secs });
    }

    let Some(creds) = repository::get_credentials_by_email(conn, email)? else {
        // Same work as a real check so unknown emails are not faster.
        let _ = verify_password(password, &[0u8; 32], &[0u8; 32]);
        lockout.record_failure(email, clock);
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &creds.salt, &creds.password_hash) {
        lockout.record_failure(email, clock);
        tracing::warn!(user_id = %creds.user_id, "Failed sign-in");
        return Err(AuthError::InvalidCredentials);
    }
    lockout.record_success(email);

    let profile = repository::get_profile(conn, &creds.user_id)?
        .ok_or_else(|| DatabaseError::not_found("profile", creds.user_id))?;

    let token = generate_token();
    let expires_at = now + ttl;
    repository::insert_session(conn, &hash_token(&token), &profile.id, &now, &expires_at)?;
    repository::purge_expired_sessions(conn, &now)?;

    tracing::info!(user_id = %profile.id, "Signed in");
    Ok(SignedIn {
        token,
        expires_at,
        profile,
    })
}

/// Returns `true` if the token named a live session.
pub fn sign_out(conn: &Connection, token: &str) -> Result<bool, AuthError> {
    Ok(repository::delete_session(conn, &hash_token(token))?)
}

pub fn current_user(conn: &Connection, token: &str, now: DateTime<Utc>) -> Result<Profile, AuthError> {
    let user_id = repository::find_session_user(conn, &hash_token(token), &now)?
        .ok_or(AuthError::InvalidSession)?;
    repository::get_profile(conn, &user_id)?.ok_or(AuthError::InvalidSession)
}

/// Issue a reset link if the email belongs to an account. Unknown emails
/// succeed silently.
pub fn request_password_reset(
    conn: &Connection,
    email: &str,
    public_url: &str,
    delivery: &dyn ResetDelivery,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let Some(profile) = repository::find_profile_by_email(conn, email)? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let token = generate_token();
    let expires_at = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    repository::insert_password_reset(conn, &hash_token(&token), &profile.id, &expires_at)?;

    let link = format!("{public_url}/auth/reset-password?token={token}");
    delivery.deliver(&profile.email, &link);
    Ok(())
}

/// Consume a reset token and set a new password. All sessions of the user
/// are revoked.
pub fn reset_password(
    conn: &Connection,
    token: &str,
    password: &str,
    confirm: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    validate_new_password(password, confirm)?;

    let tx = conn.unchecked_transaction()?;
    let user_id = repository::consume_password_reset(&tx, &hash_token(token), &now)?
        .ok_or(AuthError::InvalidResetToken)?;
    let (hash, salt) = hash_password(password);
    repository::update_password(&tx, &user_id, hash.as_bytes(), &salt, &now)?;
    let revoked = repository::delete_user_sessions(&tx, &user_id)?;
    tx.commit()?;

    tracing::info!(user_id = %user_id, revoked, "Password reset");
    Ok(())
}

pub fn change_password(
    conn: &Connection,
    user_id: &Uuid,
    password: &str,
    confirm: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    validate_new_password(password, confirm)?;
    let (hash, salt) = hash_password(password);
    repository::update_password(conn, user_id, hash.as_bytes(), &salt, &now)?;
    tracing::info!(user_id = %user_id, "Password changed");
    Ok(())
}
