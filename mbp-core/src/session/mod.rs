//! Session lifecycle: restore, login, logout and teardown.

mod context;
mod manager;

pub use context::{
    DEFAULT_API_BASE_URL, DEFAULT_APP_PREFIX, DEFAULT_ROOT_HOST_URL, SessionConfig, SessionContext,
};
pub use manager::SessionManager;
