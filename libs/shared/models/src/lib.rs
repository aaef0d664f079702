pub mod access;
pub mod auth;
pub mod error;

pub use access::{AccessDenied, AccessPolicy, Action, Resource};
pub use auth::{CallerContext, Role, User};
pub use error::AppError;
