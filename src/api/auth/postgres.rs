//! `PostgreSQL` backed stores.

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::{Connection, PgPool, Row};
use tracing::{debug, Instrument};
use uuid::Uuid;

use super::{
    password,
    session::{generate_session_token, hash_session_token},
    store::{Account, AccountStore, EstablishedSession, Session, SessionStore, StoreError},
};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Create the tables if they do not exist yet.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        debug!("Applying schema statement {}", index + 1);
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Account, StoreError> {
        let password_hash = password::hash(password).await?;
        let id = Uuid::now_v7();

        let query = r"
            INSERT INTO accounts (id, username, password_hash)
            VALUES ($1, $2, $3)
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(username)
            .bind(&password_hash)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(Account {
                id,
                username: username.to_string(),
            }),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateUsername),
            Err(err) => Err(err.into()),
        }
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<Account>, StoreError> {
        let query = "SELECT id, username, password_hash FROM accounts WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        let Some(row) = row else {
            password::verify(password, None).await?;
            return Ok(None);
        };

        let password_hash: String = row.get("password_hash");
        if password::verify(password, Some(password_hash)).await? {
            Ok(Some(Account {
                id: row.get("id"),
                username: row.get("username"),
            }))
        } else {
            Ok(None)
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(tracing::info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await?;
        conn.ping()
            .instrument(tracing::info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
    ttl_seconds: i64,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool, ttl_seconds: i64) -> Self {
        Self { pool, ttl_seconds }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn establish(&self, account: &Account) -> Result<EstablishedSession, StoreError> {
        let token = generate_session_token()?;

        let query = r"
            INSERT INTO sessions (token_hash, account_id, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
            RETURNING EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
        ";
        let row = sqlx::query(query)
            .bind(hash_session_token(&token))
            .bind(account.id)
            .bind(self.ttl_seconds)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        Ok(EstablishedSession {
            session: Session {
                account: account.clone(),
                created_at_unix: row.get("created_at_unix"),
            },
            token,
        })
    }

    async fn current(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let query = r"
            SELECT accounts.id,
                   accounts.username,
                   EXTRACT(EPOCH FROM sessions.created_at)::BIGINT AS created_at_unix
            FROM sessions
            JOIN accounts ON accounts.id = sessions.account_id
            WHERE sessions.token_hash = $1
              AND sessions.expires_at > NOW()
        ";
        let row = sqlx::query(query)
            .bind(hash_session_token(token))
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        Ok(row.map(|row| Session {
            account: Account {
                id: row.get("id"),
                username: row.get("username"),
            },
            created_at_unix: row.get("created_at_unix"),
        }))
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        sqlx::query(query)
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS accounts"));
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS sessions"));
        assert!(statements.iter().all(|statement| statement.ends_with(';')));
    }

    #[test]
    fn split_keeps_trailing_statement_without_semicolon() {
        let statements = split_sql_statements("-- comment\nSELECT 1;\n\nSELECT 2");
        assert_eq!(statements, vec!["SELECT 1;".to_string(), "SELECT 2".to_string()]);
    }
}
