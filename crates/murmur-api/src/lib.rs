pub mod auth;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod routes;
pub mod session;
pub mod state;
pub mod token;
pub mod users;
pub mod validation;

pub use routes::router;
pub use state::{AppState, AppStateInner};
