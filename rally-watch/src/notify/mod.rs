//! User notifications for newly published routes.

mod dispatcher;
mod error;
mod log;
mod message;
mod mock;
mod telegram;

use std::future::Future;

use crate::domain::UserId;

pub use dispatcher::{DeliveryOutcome, NotificationDispatcher};
pub use error::DeliveryError;
pub use log::LogNotifier;
pub use message::{Message, MessageKind};
pub use mock::RecordingNotifier;
pub use telegram::{TelegramConfig, TelegramNotifier};

/// Delivers a rendered message to one user.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        user: &UserId,
        message: &Message,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// The notifier chosen at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl Notifier for ConfiguredNotifier {
    async fn send(&self, user: &UserId, message: &Message) -> Result<(), DeliveryError> {
        match self {
            Self::Telegram(n) => n.send(user, message).await,
            Self::Log(n) => n.send(user, message).await,
        }
    }
}
