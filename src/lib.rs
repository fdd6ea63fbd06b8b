pub mod config;
pub mod config_validator;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod key_generator;
pub mod middleware;
pub mod models;
pub mod rate_limiter;
pub mod redis;
pub mod response;
pub mod server;
pub mod services;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use response::ApiResponse;
pub use server::{create_app, Server};
