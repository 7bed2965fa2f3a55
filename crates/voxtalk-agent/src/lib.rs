pub mod dispatch;
pub mod messages;
pub mod session;

pub use dispatch::Dispatcher;
pub use messages::{ClientMessage, ControlMessage, SettingsPayload};
pub use session::Session;
