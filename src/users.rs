use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand_core::OsRng;
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum CreateUserError {
    #[error("username already exists")]
    Duplicate,
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hashes `password` and stores a new user, returning the new row id.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<i64, CreateUserError> {
    let password_hash = hash_password(password).map_err(CreateUserError::Hash)?;

    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(CreateUserError::Duplicate)
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn find_user(pool: &SqlitePool, username: &str) -> sqlx::Result<Option<UserRecord>> {
    sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, password AS password_hash FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn count_users(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
pub(crate) mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    pub(crate) async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("connect in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        pool
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2").expect("hash");
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext-in-the-db"));
    }

    #[tokio::test]
    async fn create_then_find() {
        let pool = memory_pool().await;
        let id = create_user(&pool, "alice", "wonderland").await.expect("create");

        let user = find_user(&pool, "alice").await.expect("query").expect("user");
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "wonderland");
        assert!(verify_password("wonderland", &user.password_hash));
    }

    #[tokio::test]
    async fn find_unknown_user_is_none() {
        let pool = memory_pool().await;
        assert!(find_user(&pool, "nobody").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn duplicate_username_leaves_store_unchanged() {
        let pool = memory_pool().await;
        create_user(&pool, "bob", "first").await.expect("create");

        let err = create_user(&pool, "bob", "second").await.unwrap_err();
        assert!(matches!(err, CreateUserError::Duplicate));
        assert_eq!(count_users(&pool).await.expect("count"), 1);

        let user = find_user(&pool, "bob").await.expect("query").expect("user");
        assert!(verify_password("first", &user.password_hash));
    }
}
