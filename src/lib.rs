pub mod account;
pub mod appointments;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod push;
pub mod reminder;
pub mod result;
pub mod session;
pub mod state;
pub mod tasks;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{ApiError, StoreError};
pub use result::Resource;
pub use state::{ClientContext, ClientEvent};
