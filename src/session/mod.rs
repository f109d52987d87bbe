//! The conversation session core: a pure state machine plus the async driver
//! that executes its effects.

pub mod controller;
pub mod driver;
pub mod intent;
pub mod view;

pub use controller::SessionController;
pub use driver::SessionDriver;
pub use intent::{ApiCall, Completion, Effect, Intent, RequestId};
pub use view::{SessionState, ViewModel};
