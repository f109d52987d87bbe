pub mod api;
pub mod channels;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod export;
pub mod models;
pub mod session;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ConversationApi, HttpConversationApi};
pub use config::{ClientConfig, Settings, SettingsStore};
pub use coordinator::SideEffectCoordinator;
pub use errors::{ClientError, SideEffectError, ValidationError};
pub use session::{Intent, SessionController, SessionDriver, SessionState, ViewModel};
