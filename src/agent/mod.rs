pub mod client;
pub mod core;
pub mod provision;
pub mod session;

pub use client::ApiClient;
pub use self::core::{Agent, Reply};
pub use provision::{provision, teardown, Deployment};
pub use session::{Session, SessionManager, Turn};
