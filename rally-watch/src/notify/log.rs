//! Notifier that only logs, for running without a bot.

use tracing::info;

use crate::domain::UserId;

use super::error::DeliveryError;
use super::message::Message;
use super::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, user: &UserId, message: &Message) -> Result<(), DeliveryError> {
        info!(user = %user, route = %message.route, text = %message.text, "Notification");
        Ok(())
    }
}
