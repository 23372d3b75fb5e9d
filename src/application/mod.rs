//! Application layer - listener orchestration and event dispatch.

mod dispatcher;
mod listener;

pub use dispatcher::EventDispatcher;
pub use listener::{ListenerError, WebhookListener};
