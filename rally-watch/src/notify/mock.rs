//! Recording notifier for tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::UserId;

use super::error::DeliveryError;
use super::message::Message;
use super::Notifier;

/// Records every message; can be told to fail for specific users.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, Message)>>,
    failing: Mutex<HashSet<UserId>>,
    delay: Duration,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `delay` over every delivery.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every delivery to `user`.
    pub fn fail_for(&self, user: UserId) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user);
    }

    /// Messages delivered so far, in order.
    pub fn sent(&self) -> Vec<(UserId, Message)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain the delivered messages.
    pub fn take(&self) -> Vec<(UserId, Message)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, user: &UserId, message: &Message) -> Result<(), DeliveryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user)
        {
            return Err(DeliveryError::Recipient(format!("{user} is blocked")));
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((user.clone(), message.clone()));
        Ok(())
    }
}
