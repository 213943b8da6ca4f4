//! Patron notices written to the log
//!
//! `LoggingNotificationSink` stands in for a real messaging service: every
//! notice is emitted as a structured `tracing` event carrying the patron-facing
//! part of the comments.

use crate::core::comments;
use crate::core::traits::{NotificationSink, NotifyError};
use crate::types::LedgerEntry;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct LoggingNotificationSink {
    sent: AtomicUsize,
}

impl LoggingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notices emitted so far
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, entry: &LedgerEntry) -> Result<(), NotifyError> {
        let message = entry
            .comments
            .as_deref()
            .and_then(comments::patron_message)
            .unwrap_or_default();

        info!(
            user_id = %entry.user_id,
            account_id = %entry.account_id,
            action_type = %entry.action_type,
            amount = %entry.amount,
            balance = %entry.balance,
            message = %message,
            "patron notice"
        );
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, ActionKind, ActionOptions, MonetaryValue};
    use chrono::Utc;

    #[tokio::test]
    async fn test_counts_notices() {
        let sink = LoggingNotificationSink::new();
        let account = Account::new("a", "u-1", "Overdue fine", "3.00".parse().unwrap(), Utc::now());
        let options = ActionOptions {
            comments: Some("STAFF : ok \n PATRON : thanks".to_string()),
            notify_patron: true,
            ..ActionOptions::default()
        };
        let entry = LedgerEntry::record(
            &account,
            ActionKind::Pay.full_label(),
            account.remaining,
            MonetaryValue::zero(2),
            &options,
        );

        sink.notify(&entry).await.unwrap();
        sink.notify(&entry).await.unwrap();

        assert_eq!(sink.sent(), 2);
    }
}
