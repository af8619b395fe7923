use super::{is_constraint_violation, Store};
use crate::model::{normalize_email, NewUser, User, UserPatch};
use crate::security::{generate_token_key, SecurityEvent, SecurityLogger};
use crate::{RecipeError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, email, name, is_active, is_staff, is_superuser, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_active: row.get(3)?,
        is_staff: row.get(4)?,
        is_superuser: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn duplicate_email() -> RecipeError {
    RecipeError::Conflict("user with this email already exists.".into())
}

fn fetch_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| RecipeError::NotFound(format!("user {}", id)))
}

fn email_taken(conn: &Connection, email: &str, except_id: Option<i64>) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(matches!(found, Some(id) if Some(id) != except_id))
}

impl Store {
    /// Create a regular user. The email is normalized and must be unique.
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        self.insert_user(new_user, false)
    }

    /// Create a user with staff and superuser flags set.
    pub fn create_superuser(&self, new_user: &NewUser) -> Result<User> {
        self.insert_user(new_user, true)
    }

    fn insert_user(&self, new_user: &NewUser, superuser: bool) -> Result<User> {
        let new_user = new_user.validated()?;
        let password_hash = self.passwords.hash_password(&new_user.password)?;

        let conn = self.conn.lock();
        if email_taken(&conn, &new_user.email, None)? {
            return Err(duplicate_email());
        }
        conn.execute(
            r#"
            INSERT INTO users (email, name, password_hash, is_active, is_staff, is_superuser, created_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4, ?5)
            "#,
            params![
                new_user.email,
                new_user.name,
                password_hash,
                superuser,
                Utc::now()
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                duplicate_email()
            } else {
                e.into()
            }
        })?;

        let user = fetch_user(&conn, conn.last_insert_rowid())?;
        SecurityLogger::log_event(SecurityEvent::UserCreated {
            user_id: user.id,
            superuser,
        });
        Ok(user)
    }

    pub fn user_by_id(&self, id: i64) -> Result<User> {
        let conn = self.conn.lock();
        fetch_user(&conn, id)
    }

    /// Check an email/password pair. Unknown emails, wrong passwords and
    /// inactive accounts all come back as `None`.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let found: Option<(User, String)> = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                [&email],
                |row| Ok((user_from_row(row)?, row.get(7)?)),
            )
            .optional()?
        };

        let reject = |reason: &str| -> Result<Option<User>> {
            SecurityLogger::log_event(SecurityEvent::AuthenticationFailure {
                email: email.clone(),
                reason: reason.to_string(),
            });
            Ok(None)
        };

        let Some((user, hash)) = found else {
            return reject("unknown email");
        };
        if !self.passwords.verify_password(password, &hash)? {
            return reject("wrong password");
        }
        if !user.is_active {
            return reject("inactive account");
        }

        SecurityLogger::log_event(SecurityEvent::AuthenticationSuccess {
            user_id: user.id,
            method: "password".into(),
        });
        Ok(Some(user))
    }

    /// Apply a partial update to a user's own account.
    pub fn update_user(&self, id: i64, patch: &UserPatch) -> Result<User> {
        let patch = patch.validated()?;
        let password_hash = patch
            .password
            .as_deref()
            .map(|p| self.passwords.hash_password(p))
            .transpose()?;

        let conn = self.conn.lock();
        if let Some(email) = &patch.email {
            if email_taken(&conn, email, Some(id))? {
                return Err(duplicate_email());
            }
        }
        let changed = conn
            .execute(
                r#"
                UPDATE users SET
                    email = COALESCE(?1, email),
                    name = COALESCE(?2, name),
                    password_hash = COALESCE(?3, password_hash)
                WHERE id = ?4
                "#,
                params![patch.email, patch.name, password_hash, id],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    duplicate_email()
                } else {
                    e.into()
                }
            })?;
        if changed == 0 {
            return Err(RecipeError::NotFound(format!("user {}", id)));
        }
        fetch_user(&conn, id)
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET is_active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if changed == 0 {
            return Err(RecipeError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    /// Return the user's API token, issuing one on first use.
    pub fn get_or_create_token(&self, user_id: i64) -> Result<String> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT key FROM auth_tokens WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(key) = existing {
            return Ok(key);
        }

        fetch_user(&tx, user_id)?;
        let key = generate_token_key();
        tx.execute(
            "INSERT INTO auth_tokens (key, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![key, user_id, Utc::now()],
        )?;
        tx.commit()?;

        SecurityLogger::log_event(SecurityEvent::TokenIssued { user_id });
        Ok(key)
    }

    /// Resolve a token key to its active owner.
    pub fn user_for_token(&self, key: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                r#"
                SELECT u.id, u.email, u.name, u.is_active, u.is_staff, u.is_superuser, u.created_at
                FROM auth_tokens t
                JOIN users u ON u.id = t.user_id
                WHERE t.key = ?1 AND u.is_active = 1
                "#,
                [key],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, password: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Test Name".into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_create_user_with_email_successful() {
        let store = Store::memory().unwrap();
        let user = store
            .create_user(&new_user("test@example.com", "testpass123"))
            .unwrap();

        assert_eq!(user.email, "test@example.com");
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(store
            .authenticate("test@example.com", "testpass123")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_new_user_email_normalized_on_create() {
        let store = Store::memory().unwrap();
        let user = store
            .create_user(&new_user("Test2@Example.com", "samplepass123"))
            .unwrap();
        assert_eq!(user.email, "Test2@example.com");
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let store = Store::memory().unwrap();
        store
            .create_user(&new_user("test@example.com", "pass1234"))
            .unwrap();
        let err = store
            .create_user(&new_user("test@EXAMPLE.com", "pass1234"))
            .unwrap_err();
        assert!(matches!(err, RecipeError::Conflict(_)));
    }

    #[test]
    fn test_create_superuser() {
        let store = Store::memory().unwrap();
        let user = store
            .create_superuser(&new_user("superuser@example.com", "test1234"))
            .unwrap();
        assert!(user.is_superuser);
        assert!(user.is_staff);
    }

    #[test]
    fn test_authenticate_rejects_bad_password_and_inactive() {
        let store = Store::memory().unwrap();
        let user = store
            .create_user(&new_user("user@example.com", "pass1234"))
            .unwrap();

        assert!(store.authenticate("user@example.com", "wrong-pass").unwrap().is_none());
        assert!(store.authenticate("nobody@example.com", "pass1234").unwrap().is_none());

        store.set_user_active(user.id, false).unwrap();
        assert!(store.authenticate("user@example.com", "pass1234").unwrap().is_none());
    }

    #[test]
    fn test_token_is_stable_per_user() {
        let store = Store::memory().unwrap();
        let user = store
            .create_user(&new_user("user@example.com", "pass1234"))
            .unwrap();

        let first = store.get_or_create_token(user.id).unwrap();
        let second = store.get_or_create_token(user.id).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.user_for_token(&first).unwrap(), Some(user.clone()));
        assert!(store.user_for_token("bogus").unwrap().is_none());

        store.set_user_active(user.id, false).unwrap();
        assert!(store.user_for_token(&first).unwrap().is_none());
    }

    #[test]
    fn test_token_for_missing_user() {
        let store = Store::memory().unwrap();
        assert!(matches!(
            store.get_or_create_token(42),
            Err(RecipeError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_user_profile_and_password() {
        let store = Store::memory().unwrap();
        let user = store
            .create_user(&new_user("user@example.com", "pass1234"))
            .unwrap();

        let updated = store
            .update_user(
                user.id,
                &UserPatch {
                    name: Some("Updated Name".into()),
                    password: Some("newpassword123".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Updated Name");
        assert_eq!(updated.email, "user@example.com");
        assert!(store.authenticate("user@example.com", "newpassword123").unwrap().is_some());
        assert!(store.authenticate("user@example.com", "pass1234").unwrap().is_none());
    }

    #[test]
    fn test_update_user_email_conflict() {
        let store = Store::memory().unwrap();
        store
            .create_user(&new_user("taken@example.com", "pass1234"))
            .unwrap();
        let user = store
            .create_user(&new_user("user@example.com", "pass1234"))
            .unwrap();

        let err = store
            .update_user(
                user.id,
                &UserPatch {
                    email: Some("taken@example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RecipeError::Conflict(_)));

        // Re-saving one's own email is not a conflict.
        assert!(store
            .update_user(
                user.id,
                &UserPatch {
                    email: Some("user@EXAMPLE.com".into()),
                    ..Default::default()
                },
            )
            .is_ok());
    }
}
