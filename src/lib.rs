pub mod config;
pub mod controllers;
pub mod error;
pub mod payment;
pub mod routes;
pub mod store;
pub mod ui;

pub use config::Config;
pub use controllers::AppState;
pub use error::{ApiError, StartupError};
pub use payment::{Payment, PaymentStatus, ValidationError};
pub use routes::create_routes;
pub use store::{InMemoryStore, PaymentStore, StoreError};
