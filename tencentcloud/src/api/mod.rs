pub mod auth;
pub mod client;
pub mod error;
pub mod ratelimit;
pub mod response;

pub use auth::{Authorizer, SignRequest, StaticToken, Tc3Signer};
pub use client::Client;
pub use error::ApiError;
pub use ratelimit::RateLimiter;
