use anyhow::Context;
use rusqlite::Connection;

use crate::auth::password::{hash_password, verify_password};
use crate::db::queries;
use crate::models::{Role, User};

/// Returns the user when `password` matches the stored hash.
pub fn authenticate(
    conn: &Connection,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let Some(user) = queries::get_user_by_username(conn, username)? else {
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash) {
        tracing::debug!(username, "password mismatch");
        return Ok(None);
    }

    Ok(Some(user))
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<i64> {
    let hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    queries::create_user(conn, username, &hash, role)
        .with_context(|| format!("failed to create user {username}"))
}

/// Seeds an admin account when no users exist yet. Returns whether one was created.
pub fn ensure_admin(conn: &Connection, username: &str, password: &str) -> anyhow::Result<bool> {
    if queries::count_users(conn)? > 0 {
        return Ok(false);
    }

    create_user(conn, username, password, Role::Admin)?;
    tracing::info!(username, "default admin user created");
    Ok(true)
}
