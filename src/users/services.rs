use anyhow::Context;
use tracing::{error, info, instrument, warn};

use crate::users::password::{hash_if_plain, matches_stored, PasswordError};
use crate::users::repo::UserRepository;
use crate::users::repo_types::{normalize_email, DefaultUserSeed, User};

/// Normalize emails, hash plain-text seed passwords, and insert the seeds
/// idempotently. Returns the number of seeds handed to the repository.
#[instrument(skip(repo, seeds), fields(count = seeds.len()))]
pub async fn seed_default_users(
    repo: &dyn UserRepository,
    seeds: Vec<DefaultUserSeed>,
) -> anyhow::Result<usize> {
    let seeds = seeds
        .into_iter()
        .map(|mut seed| -> anyhow::Result<DefaultUserSeed> {
            seed.email = normalize_email(&seed.email);
            seed.password = hash_if_plain(&seed.password)
                .with_context(|| format!("hash password of default user {}", seed.id))?;
            Ok(seed)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    repo.create_default_users(&seeds)
        .await
        .context("insert default users")?;
    info!(count = seeds.len(), "default users ensured");
    Ok(seeds.len())
}

/// Look up a user by email and check the password.
///
/// `Ok(None)` covers an unknown email, a wrong password, and a stored
/// credential that is not an Argon2 hash (logged as an error). A match is
/// returned scrubbed. `Err` is left for repository failures.
#[instrument(skip(repo, email, password))]
pub async fn verify_login(
    repo: &dyn UserRepository,
    email: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let email = normalize_email(email);
    let user = match repo.get_user_by_email(&email).await {
        Ok(u) => u,
        Err(e) if e.is_not_found() => {
            warn!("login unknown email");
            return Ok(None);
        }
        Err(e) => return Err(e).context("find user by email"),
    };

    match matches_stored(password, &user.password) {
        Ok(true) => {}
        Ok(false) => {
            warn!(user_id = %user.id, "login invalid password");
            return Ok(None);
        }
        Err(e @ PasswordError::MalformedHash(_)) => {
            error!(user_id = %user.id, error = %e, "stored credential unusable");
            return Ok(None);
        }
        Err(e) => return Err(e).context("verify password"),
    }

    info!(user_id = %user.id, "login verified");
    Ok(Some(user.scrubbed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::errors::{RepoError, RepoResult};
    use crate::users::repo_types::{
        NewUser, Permission, UserStatus, UserUpdateInfoParams, UserUpdatePasswordParams,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeRepo {
        rows: Mutex<Vec<User>>,
    }

    impl FakeRepo {
        fn find(&self, id: Uuid) -> RepoResult<User> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned()
                .ok_or(RepoError::NotFound { id })
        }
    }

    #[async_trait]
    impl UserRepository for FakeRepo {
        async fn create(&self, user: &NewUser) -> RepoResult<()> {
            self.rows.lock().unwrap().push(User {
                id: user.id,
                name: user.name.clone(),
                email: user.email.clone(),
                password: user.password.clone(),
                permission: user.permission,
                status: user.status,
                updated_at: OffsetDateTime::now_utc(),
            });
            Ok(())
        }

        async fn update_password(&self, params: &UserUpdatePasswordParams) -> RepoResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows
                .iter_mut()
                .find(|u| u.id == params.id)
                .ok_or(RepoError::NotFound { id: params.id })?;
            user.password = params.password.clone();
            Ok(())
        }

        async fn update_info(&self, params: &UserUpdateInfoParams, _user_id: Uuid) -> RepoResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let user = rows
                .iter_mut()
                .find(|u| u.id == params.id)
                .ok_or(RepoError::NotFound { id: params.id })?;
            user.name = params.name.clone();
            user.permission = params.permission;
            Ok(())
        }

        async fn get_by_id(&self, id: Uuid) -> RepoResult<User> {
            Ok(self.find(id)?.scrubbed())
        }

        async fn get_by_id_with_password(&self, id: Uuid) -> RepoResult<User> {
            self.find(id)
        }

        async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned()
                .ok_or_else(|| RepoError::NotFoundByEmail { email: email.to_owned() })
        }

        async fn get_users(&self) -> RepoResult<Vec<User>> {
            Ok(self.rows.lock().unwrap().iter().cloned().map(User::scrubbed).collect())
        }

        async fn create_default_users(&self, seeds: &[DefaultUserSeed]) -> RepoResult<()> {
            let mut rows = self.rows.lock().unwrap();
            for seed in seeds {
                if rows.iter().any(|u| u.id == seed.id) {
                    continue;
                }
                rows.push(User {
                    id: seed.id,
                    name: seed.name.clone(),
                    email: seed.email.clone(),
                    password: seed.password.clone(),
                    permission: Permission::default(),
                    status: seed.status,
                    updated_at: OffsetDateTime::now_utc(),
                });
            }
            Ok(())
        }
    }

    fn admin_seed(id: Uuid) -> DefaultUserSeed {
        DefaultUserSeed {
            id,
            email: "admin@example.com".into(),
            name: "Admin".into(),
            password: "changeme".into(),
            status: UserStatus::Active,
        }
    }

    #[tokio::test]
    async fn seeding_hashes_plain_passwords() {
        let repo = FakeRepo::default();
        let id = Uuid::new_v4();
        let count = seed_default_users(&repo, vec![admin_seed(id)]).await.expect("seed");
        assert_eq!(count, 1);

        let stored = repo.get_by_id_with_password(id).await.expect("stored");
        assert_ne!(stored.password, "changeme");
        assert!(matches_stored("changeme", &stored.password).expect("verify"));
    }

    #[tokio::test]
    async fn seeding_keeps_prehashed_passwords() {
        let repo = FakeRepo::default();
        let id = Uuid::new_v4();
        let hash = hash_if_plain("changeme").expect("hash");
        let mut seed = admin_seed(id);
        seed.password = hash.clone();

        seed_default_users(&repo, vec![seed]).await.expect("seed");
        let stored = repo.get_by_id_with_password(id).await.expect("stored");
        assert_eq!(stored.password, hash);
    }

    #[tokio::test]
    async fn reseeding_leaves_one_row() {
        let repo = FakeRepo::default();
        let id = Uuid::new_v4();
        seed_default_users(&repo, vec![admin_seed(id)]).await.expect("first");
        seed_default_users(&repo, vec![admin_seed(id)]).await.expect("second");
        assert_eq!(repo.get_users().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn login_accepts_correct_password_and_scrubs() {
        let repo = FakeRepo::default();
        let id = Uuid::new_v4();
        seed_default_users(&repo, vec![admin_seed(id)]).await.expect("seed");

        let user = verify_login(&repo, "  Admin@Example.com ", "changeme")
            .await
            .expect("login")
            .expect("valid credentials");
        assert_eq!(user.id, id);
        assert!(user.password.is_empty());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_unknown_email() {
        let repo = FakeRepo::default();
        seed_default_users(&repo, vec![admin_seed(Uuid::new_v4())])
            .await
            .expect("seed");

        assert!(verify_login(&repo, "admin@example.com", "nope")
            .await
            .expect("login")
            .is_none());
        assert!(verify_login(&repo, "ghost@example.com", "changeme")
            .await
            .expect("login")
            .is_none());
    }

    #[tokio::test]
    async fn mixed_case_seed_email_can_log_in() {
        let repo = FakeRepo::default();
        let id = Uuid::new_v4();
        let mut seed = admin_seed(id);
        seed.email = "Admin@Example.com".into();
        seed_default_users(&repo, vec![seed]).await.expect("seed");

        let stored = repo.get_by_id(id).await.expect("stored");
        assert_eq!(stored.email, "admin@example.com");

        let user = verify_login(&repo, "Admin@Example.com", "changeme")
            .await
            .expect("login")
            .expect("seeded user logs in with its own email");
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn unhashed_stored_credential_is_rejected_without_error() {
        let repo = FakeRepo::default();
        let user = NewUser::new("Plain", "plain@example.com", "not-a-hash", Permission::Viewer);
        repo.create(&user).await.expect("create");

        let outcome = verify_login(&repo, "plain@example.com", "not-a-hash")
            .await
            .expect("bad stored credential is not a lookup failure");
        assert!(outcome.is_none());
    }
}
