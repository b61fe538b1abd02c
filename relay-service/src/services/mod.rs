pub mod keep_alive;
pub mod providers;
pub mod sessions;

pub use keep_alive::KeepAlive;
pub use sessions::{Session, SessionHandle, SessionStore, Speaker, HISTORY_CAPACITY};
