pub mod errors;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use errors::{classify, DbError, RepoError, RepoResult};
pub use repo::{PgUserRepository, UserRepository};
pub use repo_types::{
    normalize_email, DefaultUserSeed, NewUser, Permission, User, UserStatus, UserUpdateInfoParams,
    UserUpdatePasswordParams,
};
