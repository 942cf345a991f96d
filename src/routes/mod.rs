use serde_json::{json, Value};

use crate::{models::NewNotification, AppState};

pub mod auth;
pub mod compounds;
pub mod cycles;
pub mod injections;
pub mod notifications;
pub mod posts;
pub mod side_effects;
pub mod users;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Resolved `page` / `limit` query pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub limit: u32,
    pub offset: u32,
}

impl Paging {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self { page, limit, offset: (page - 1).saturating_mul(limit) }
    }
}

pub(crate) fn message(text: impl Into<String>) -> Value {
    json!({ "message": text.into() })
}

/// Notifications are a side effect of the action that caused them; a failed
/// insert is logged and never fails the request.
pub(crate) async fn notify(state: &AppState, notification: NewNotification) {
    let recipient = notification.user_id;
    let kind = notification.kind;
    if let Err(e) = state.store.notify(notification).await {
        tracing::warn!("⚠️ Could not store {} notification for {}: {}", kind, recipient, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(Paging::new(None, None), Paging { page: 1, limit: 20, offset: 0 });
        assert_eq!(Paging::new(Some(3), Some(10)), Paging { page: 3, limit: 10, offset: 20 });
        assert_eq!(Paging::new(Some(0), Some(1000)).limit, MAX_PAGE_SIZE);
        assert_eq!(Paging::new(Some(0), Some(0)), Paging { page: 1, limit: 1, offset: 0 });
    }
}
