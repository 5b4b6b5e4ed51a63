pub mod models;
pub mod routes;
pub mod state;

pub use state::{AppState, SessionHost};
