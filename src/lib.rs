//! Data access for the `users` table.
//!
//! [`users::PgUserRepository`] is the entry point; it is constructed from a
//! `sqlx::PgPool` and reports failures as [`users::RepoError`].

pub mod config;
pub mod db;
pub mod users;
