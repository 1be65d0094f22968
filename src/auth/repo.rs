use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("email already registered")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Credential store used by the local login and registration flows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, full_name, nickname, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, nickname, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, full_name, nickname, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.nickname)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepoError::Duplicate
            }
            other => RepoError::Database(other),
        })?;
        Ok(created)
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryUserStore;

#[cfg(test)]
mod memory {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::RwLock;
    use uuid::Uuid;

    use super::{RepoError, UserStore};
    use crate::auth::repo_types::{NewUser, User};

    /// In-memory store keyed by email, enforcing the same uniqueness as the table.
    #[derive(Default)]
    pub(crate) struct MemoryUserStore {
        users: RwLock<HashMap<String, User>>,
    }

    impl MemoryUserStore {
        pub(crate) async fn len(&self) -> usize {
            self.users.read().await.len()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
            Ok(self.users.read().await.get(email).cloned())
        }

        async fn create(&self, user: NewUser) -> Result<User, RepoError> {
            let mut users = self.users.write().await;
            if users.contains_key(&user.email) {
                return Err(RepoError::Duplicate);
            }
            let created = User {
                id: Uuid::new_v4(),
                email: user.email,
                full_name: user.full_name,
                nickname: user.nickname,
                password_hash: user.password_hash,
                created_at: OffsetDateTime::now_utc(),
            };
            users.insert(created.email.clone(), created.clone());
            Ok(created)
        }
    }

    mod tests {
        use super::*;

        fn new_user(email: &str) -> NewUser {
            NewUser {
                email: email.into(),
                full_name: "Ann Lee".into(),
                nickname: "annl".into(),
                password_hash: "hash".into(),
            }
        }

        #[tokio::test]
        async fn rejects_duplicate_email() {
            let store = MemoryUserStore::default();
            store.create(new_user("ann@x.com")).await.unwrap();
            let err = store.create(new_user("ann@x.com")).await.unwrap_err();
            assert!(matches!(err, RepoError::Duplicate));
            assert_eq!(store.len().await, 1);
        }

        #[tokio::test]
        async fn finds_created_user() {
            let store = MemoryUserStore::default();
            store.create(new_user("ann@x.com")).await.unwrap();
            let found = store.find_by_email("ann@x.com").await.unwrap().unwrap();
            assert_eq!(found.nickname, "annl");
            assert!(store.find_by_email("bob@x.com").await.unwrap().is_none());
        }
    }
}
