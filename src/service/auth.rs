use crate::db::{self, Database, NewUser, UserRow};
use crate::error::{TrackerError, TrackerResult};
use crate::service::{achievements, require_user};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
const SALT_BYTES: usize = 16;
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: i64,
    pub user: UserRow,
}

pub fn hash_password(password: &str, salt: &str) -> String {
    hex::encode(Sha256::digest(format!("{salt}:{password}").as_bytes()))
}

/// Tokens are only ever stored as their digest.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_registration(input: &Registration) -> TrackerResult<()> {
    if input.username.trim().is_empty() {
        return Err(TrackerError::invalid("username must not be empty"));
    }

    let email = normalize_email(&input.email);
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(TrackerError::invalid("email address is not valid"));
    }

    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(TrackerError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    Ok(())
}

fn issue_session(
    conn: &Connection,
    user_id: &str,
    ttl_hours: u32,
    now: DateTime<Utc>,
) -> TrackerResult<(String, i64)> {
    let token = random_hex(TOKEN_BYTES);
    let expires_at = (now + Duration::hours(i64::from(ttl_hours.max(1)))).timestamp();

    db::purge_expired_sessions(conn, now.timestamp())?;
    db::insert_session(conn, &hash_token(&token), user_id, now.timestamp(), expires_at)?;

    Ok((token, expires_at))
}

/// Registers activity for today and persists the streak if it moved.
fn touch_streak(conn: &Connection, user: &UserRow, now: DateTime<Utc>) -> TrackerResult<()> {
    let (streak, changed) = user.streak().touch(now.date_naive());
    if changed {
        db::update_user_streak(conn, &user.id, &streak)?;
        achievements::unlock_earned(conn, &user.id, now.timestamp())?;
    }
    Ok(())
}

pub fn register(
    database: &mut Database,
    input: &Registration,
    ttl_hours: u32,
    now: DateTime<Utc>,
) -> TrackerResult<AuthSession> {
    validate_registration(input)?;
    let email = normalize_email(&input.email);

    database.write(|tx| {
        if db::email_exists(tx, &email)? {
            return Err(TrackerError::Conflict("Email already registered".to_string()));
        }

        let user_id = Uuid::new_v4().to_string();
        let salt = random_hex(SALT_BYTES);
        let password_hash = hash_password(&input.password, &salt);
        db::insert_user(
            tx,
            &NewUser {
                id: &user_id,
                username: input.username.trim(),
                email: &email,
                password_hash: &password_hash,
                password_salt: &salt,
                created_at: now.timestamp(),
            },
        )?;

        let created = require_user(tx, &user_id)?;
        touch_streak(tx, &created, now)?;
        let (token, expires_at) = issue_session(tx, &user_id, ttl_hours, now)?;
        info!(user_id = %user_id, "User registered");

        Ok(AuthSession {
            token,
            expires_at,
            user: require_user(tx, &user_id)?,
        })
    })
}

pub fn login(
    database: &mut Database,
    credentials: &Credentials,
    ttl_hours: u32,
    now: DateTime<Utc>,
) -> TrackerResult<AuthSession> {
    let email = normalize_email(&credentials.email);
    let invalid = || TrackerError::Unauthorized("Invalid credentials".to_string());

    database.write(|tx| {
        let stored = db::credentials_by_email(tx, &email)?.ok_or_else(invalid)?;
        if hash_password(&credentials.password, &stored.password_salt) != stored.password_hash {
            return Err(invalid());
        }

        let user = require_user(tx, &stored.user_id)?;
        touch_streak(tx, &user, now)?;
        let (token, expires_at) = issue_session(tx, &user.id, ttl_hours, now)?;

        Ok(AuthSession {
            token,
            expires_at,
            user: require_user(tx, &user.id)?,
        })
    })
}

pub fn authenticate(conn: &Connection, token: &str, now: DateTime<Utc>) -> TrackerResult<UserRow> {
    db::user_for_session(conn, &hash_token(token), now.timestamp())?
        .ok_or_else(|| TrackerError::Unauthorized("Invalid or expired token".to_string()))
}

pub fn logout(conn: &Connection, token: &str) -> TrackerResult<()> {
    db::delete_session(conn, &hash_token(token))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Credentials, Registration, authenticate, login, logout, register};
    use crate::db::test_support::temp_database;
    use crate::engine::discipline::STARTING_DISCIPLINE;
    use crate::error::TrackerError;
    use crate::service::test_support::{at, register_user};

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn register_starts_a_streak_and_rejects_duplicate_email() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "dee@example.com");

        assert_eq!(session.user.current_streak, 1);
        assert_eq!(session.user.longest_streak, 1);
        assert_eq!(session.user.discipline_score, STARTING_DISCIPLINE);
        assert_eq!(session.user.level, 1);

        let duplicate = Registration {
            username: "other".to_string(),
            email: " DEE@example.com ".to_string(),
            password: "password1".to_string(),
        };
        let error = register(&mut database, &duplicate, 24, at(2026, 3, 10, 10))
            .expect_err("duplicate email");
        assert!(matches!(error, TrackerError::Conflict(_)));
    }

    #[test]
    fn weak_registration_is_rejected() {
        let (_dir, mut database) = temp_database();
        let input = Registration {
            username: "eve".to_string(),
            email: "eve-at-example".to_string(),
            password: "123".to_string(),
        };

        let error = register(&mut database, &input, 24, at(2026, 3, 10, 10))
            .expect_err("invalid registration");
        assert!(matches!(error, TrackerError::InvalidInput(_)));
    }

    #[test]
    fn login_extends_streak_then_resets_after_gap() {
        let (_dir, mut database) = temp_database();
        register_user(&mut database, "fin@example.com");

        let next_day = login(
            &mut database,
            &credentials("fin@example.com", "hunter22"),
            24,
            at(2026, 3, 11, 7),
        )
        .expect("login next day");
        assert_eq!(next_day.user.current_streak, 2);
        assert_eq!(next_day.user.longest_streak, 2);

        let same_day = login(
            &mut database,
            &credentials("fin@example.com", "hunter22"),
            24,
            at(2026, 3, 11, 22),
        )
        .expect("login same day");
        assert_eq!(same_day.user.current_streak, 2);

        let after_gap = login(
            &mut database,
            &credentials("fin@example.com", "hunter22"),
            24,
            at(2026, 3, 13, 7),
        )
        .expect("login after gap");
        assert_eq!(after_gap.user.current_streak, 1);
        assert_eq!(after_gap.user.longest_streak, 2);
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let (_dir, mut database) = temp_database();
        register_user(&mut database, "gil@example.com");

        let error = login(
            &mut database,
            &credentials("gil@example.com", "not-it"),
            24,
            at(2026, 3, 10, 10),
        )
        .expect_err("bad password");
        assert!(matches!(error, TrackerError::Unauthorized(_)));
    }

    #[test]
    fn tokens_expire_and_can_be_revoked() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "hal@example.com");

        let user = authenticate(database.conn(), &session.token, at(2026, 3, 10, 20))
            .expect("token valid");
        assert_eq!(user.id, session.user.id);

        assert!(authenticate(database.conn(), &session.token, at(2026, 3, 11, 10)).is_err());

        let fresh = login(
            &mut database,
            &credentials("hal@example.com", "hunter22"),
            24,
            at(2026, 3, 11, 10),
        )
        .expect("login");
        logout(database.conn(), &fresh.token).expect("logout");
        assert!(authenticate(database.conn(), &fresh.token, at(2026, 3, 11, 11)).is_err());
    }
}
