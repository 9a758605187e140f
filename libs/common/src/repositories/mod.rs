//! Repositories shared by the services

pub mod user;

pub use user::UserRepository;
