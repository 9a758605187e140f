//! Shared domain models

pub mod user;

pub use user::{LoginCredentials, NewUser, Role, UpdateUser, User};
