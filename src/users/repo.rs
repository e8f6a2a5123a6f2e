use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::users::errors::{RepoError, RepoResult};
use crate::users::repo_types::{
    normalize_email, DefaultUserSeed, NewUser, User, UserUpdateInfoParams,
    UserUpdatePasswordParams,
};

/// Postgres caps a statement at 65535 bind parameters; a seed row takes five.
const SEED_BATCH: usize = 10_000;

const UPDATE_PASSWORD_FAILED: &str = "failed to update password";
const UPDATE_INFO_FAILED: &str = "failed to update user info";

/// Data access for the `users` table.
///
/// Every method runs exactly one statement (seed insertion splits only past
/// `SEED_BATCH` rows) and never retries. Reads other than
/// [`get_by_id_with_password`](UserRepository::get_by_id_with_password) and
/// [`get_user_by_email`](UserRepository::get_user_by_email) return users with
/// an empty `password`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> RepoResult<()>;

    async fn update_password(&self, params: &UserUpdatePasswordParams) -> RepoResult<()>;

    /// `user_id` must name the same row as `params.id`.
    async fn update_info(&self, params: &UserUpdateInfoParams, user_id: Uuid) -> RepoResult<()>;

    async fn get_by_id(&self, id: Uuid) -> RepoResult<User>;

    /// Same as `get_by_id` but keeps the credential. Authentication only.
    async fn get_by_id_with_password(&self, id: Uuid) -> RepoResult<User>;

    /// Keeps the credential: the login flow verifies it. Never hand the result
    /// to an untrusted consumer without calling [`User::scrubbed`].
    async fn get_user_by_email(&self, email: &str) -> RepoResult<User>;

    /// All users without credentials, in whatever order the store returns them.
    async fn get_users(&self) -> RepoResult<Vec<User>>;

    /// Insert seeds, skipping any whose `id` already exists.
    ///
    /// Seeds are written in batches of `SEED_BATCH` rows, one statement each and
    /// without a surrounding transaction. A failure in a later batch leaves the
    /// earlier batches applied; re-running the same seeds completes the set.
    async fn create_default_users(&self, seeds: &[DefaultUserSeed]) -> RepoResult<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_by_id(&self, id: Uuid) -> RepoResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, permission, status, updated_at
            FROM users
            WHERE users.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %id, "fetch user by id failed");
            RepoError::from_sqlx(e, "failed to read user row")
        })?
        .ok_or_else(|| {
            debug!(user_id = %id, "user not found");
            RepoError::NotFound { id }
        })
    }
}

/// Zero affected rows means the target id does not exist.
fn ensure_affected(rows_affected: u64, id: Uuid) -> RepoResult<()> {
    if rows_affected == 0 {
        warn!(user_id = %id, "update matched no rows");
        return Err(RepoError::NotFound { id });
    }
    Ok(())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: &NewUser) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, permission, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(normalize_email(&user.email))
        .bind(&user.password)
        .bind(user.permission)
        .bind(user.status)
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "create user failed");
            RepoError::from_sqlx(e, "failed to insert user")
        })?;

        debug!("user created");
        Ok(())
    }

    #[instrument(skip(self, params), fields(user_id = %params.id))]
    async fn update_password(&self, params: &UserUpdatePasswordParams) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(&params.password)
            .bind(params.id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "update password failed");
                RepoError::from_sqlx(e, UPDATE_PASSWORD_FAILED)
            })?;

        ensure_affected(result.rows_affected(), params.id)
    }

    #[instrument(skip(self, params), fields(target_id = %params.id))]
    async fn update_info(&self, params: &UserUpdateInfoParams, user_id: Uuid) -> RepoResult<()> {
        if user_id != params.id {
            warn!(%user_id, "update target does not match params");
            return Err(RepoError::IdentifierMismatch {
                expected: params.id,
                got: user_id,
            });
        }

        let result = sqlx::query("UPDATE users SET name = $1, permission = $2 WHERE id = $3")
            .bind(&params.name)
            .bind(params.permission)
            .bind(params.id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "update user info failed");
                RepoError::from_sqlx(e, UPDATE_INFO_FAILED)
            })?;

        ensure_affected(result.rows_affected(), params.id)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> RepoResult<User> {
        Ok(self.fetch_by_id(id).await?.scrubbed())
    }

    #[instrument(skip(self))]
    async fn get_by_id_with_password(&self, id: Uuid) -> RepoResult<User> {
        self.fetch_by_id(id).await
    }

    #[instrument(skip(self, email))]
    async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, permission, status, updated_at
            FROM users
            WHERE users.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "fetch user by email failed");
            RepoError::from_sqlx(e, "failed to read user row")
        })?
        .ok_or_else(|| RepoError::NotFoundByEmail {
            email: email.to_owned(),
        })
    }

    #[instrument(skip(self))]
    async fn get_users(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, name, updated_at, permission, status FROM users",
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "list users failed");
            RepoError::from_sqlx(e, "failed to read user rows")
        })?;

        debug!(count = users.len(), "users listed");
        Ok(users)
    }

    #[instrument(skip(self, seeds), fields(count = seeds.len()))]
    async fn create_default_users(&self, seeds: &[DefaultUserSeed]) -> RepoResult<()> {
        for batch in seeds.chunks(SEED_BATCH) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO users (id, email, name, password, status) ",
            );
            qb.push_values(batch, |mut row, seed| {
                row.push_bind(seed.id)
                    .push_bind(normalize_email(&seed.email))
                    .push_bind(seed.name.as_str())
                    .push_bind(seed.password.as_str())
                    .push_bind(seed.status);
            });
            qb.push(" ON CONFLICT (id) DO NOTHING");

            let result = qb.build().execute(&self.db).await.map_err(|e| {
                error!(error = %e, "insert default users failed");
                RepoError::from_sqlx(e, "failed to insert default users")
            })?;
            debug!(inserted = result.rows_affected(), "default users seeded");
        }
        Ok(())
    }
}
