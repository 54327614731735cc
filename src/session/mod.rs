pub mod runner;
pub mod state;

pub use runner::{spawn_session, SessionHandle, SessionOptions};
pub use state::{FetchStatus, Session, SessionView};
