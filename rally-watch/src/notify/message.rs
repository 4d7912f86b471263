//! Notification message rendering.

use askama::Template;

use crate::domain::{Route, RouteKey};

use super::error::DeliveryError;

/// Which end of the route made the user interested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    FromFavorite,
    ToFavorite,
}

#[derive(Template)]
#[template(path = "new_route.html")]
struct NewRouteTemplate<'a> {
    kind: MessageKind,
    origin: &'a str,
    destination: &'a str,
    start: String,
    end: String,
    days: i64,
    model: Option<&'a str>,
    booking_url: String,
}

/// A rendered notification, as HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub route: RouteKey,
    pub kind: MessageKind,
    pub text: String,
}

impl Message {
    /// Render the "new route" notification.
    pub fn new_route(
        route: &Route,
        kind: MessageKind,
        booking_base: &str,
    ) -> Result<Self, DeliveryError> {
        let template = NewRouteTemplate {
            kind,
            origin: &route.origin.name,
            destination: &route.destination.name,
            start: route.window.start().format("%Y-%m-%d").to_string(),
            end: route.window.end().format("%Y-%m-%d").to_string(),
            days: route.window.days(),
            model: route.model.as_ref().map(|m| m.name.as_str()),
            booking_url: route.booking_url(booking_base),
        };

        Ok(Self {
            route: route.key(),
            kind,
            text: template.render()?.trim().to_string(),
        })
    }
}
