//! Fan-out of new routes to the users watching them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{DiffResult, RouteKey, RouteSet, UserId};
use crate::store::FavoriteStore;

use super::error::DeliveryError;
use super::message::{Message, MessageKind};
use super::Notifier;

/// Result of one delivery attempt.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub user: UserId,
    pub route: RouteKey,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Sends one message per (added route, watching user).
///
/// Removed routes are never announced.
pub struct NotificationDispatcher<N> {
    notifier: N,
    favorites: Arc<FavoriteStore>,
    booking_base: String,
}

impl<N: Notifier> NotificationDispatcher<N> {
    pub fn new(notifier: N, favorites: Arc<FavoriteStore>, booking_base: impl Into<String>) -> Self {
        Self {
            notifier,
            favorites,
            booking_base: booking_base.into(),
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Announce every added route to its watchers, in key order.
    ///
    /// A failed delivery is recorded in its outcome and does not stop the
    /// others.
    pub async fn dispatch(&self, diff: &DiffResult, routes: &RouteSet) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();

        for key in &diff.added {
            let Some(route) = routes.get(key) else {
                warn!(route = %key, "Added route missing from route set");
                continue;
            };

            for user in self.favorites.watchers(route) {
                let kind = if self.favorites.stations_for(&user).contains(&route.origin.id) {
                    MessageKind::FromFavorite
                } else {
                    MessageKind::ToFavorite
                };

                let result = match Message::new_route(route, kind, &self.booking_base) {
                    Ok(message) => self.notifier.send(&user, &message).await,
                    Err(e) => Err(e),
                };

                if let Err(e) = &result {
                    warn!(user = %user, route = %key, error = %e, "Notification failed");
                }

                outcomes.push(DeliveryOutcome {
                    user,
                    route: *key,
                    result,
                });
            }
        }

        if !outcomes.is_empty() {
            let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
            info!(
                delivered,
                failed = outcomes.len() - delivered,
                "Dispatched notifications"
            );
        }

        outcomes
    }
}
