//! Merchant notification feed.
//!
//! Notifications are an append-only feed the merchant dashboard polls:
//! order alerts, stock alerts, and system messages. They are advisory;
//! nothing in checkout depends on a notification landing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use stablemart_core::{NotificationId, NotificationKind};

use crate::checkout::{BoxError, NotificationSink};
use crate::db::RepositoryError;

/// A notification yet to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl NewNotification {
    /// A new order landed for `product`.
    #[must_use]
    pub fn order(product: &str, quantity: u32) -> Self {
        Self {
            title: "New Order Received".to_string(),
            message: format!("You have received a new order for {product} ({quantity} items)."),
            kind: NotificationKind::Order,
        }
    }

    /// `product` dropped into the low-stock band.
    #[must_use]
    pub fn low_stock(product: &str, remaining: u32) -> Self {
        Self {
            title: "Low Stock Alert".to_string(),
            message: format!("{product} is running low on stock ({remaining} remaining)."),
            kind: NotificationKind::Stock,
        }
    }

    /// `product` sold out.
    #[must_use]
    pub fn out_of_stock(product: &str) -> Self {
        Self {
            title: "Out of Stock Alert".to_string(),
            message: format!("{product} is now out of stock."),
            kind: NotificationKind::Stock,
        }
    }

    /// A platform-originated message.
    #[must_use]
    pub fn system(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::System,
        }
    }
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(rename = "read")]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    title: String,
    message: String,
    kind: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepositoryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::parse(&row.kind).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "invalid notification kind in database: {}",
                row.kind
            ))
        })?;
        Ok(Self {
            id: NotificationId::new(row.id),
            title: row.title,
            message: row.message,
            kind,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

/// Repository for notification database operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a notification to the feed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewNotification) -> Result<Notification, RepositoryError> {
        let row: NotificationRow = sqlx::query_as(
            r"
            INSERT INTO notifications (title, message, kind)
            VALUES ($1, $2, $3)
            RETURNING id, title, message, kind, is_read, created_at
            ",
        )
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.kind.as_str())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// List the most recent notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `DataCorruption` for a row with an unknown kind.
    pub async fn list(&self, limit: i64) -> Result<Vec<Notification>, RepositoryError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r"
            SELECT id, title, message, kind, is_read, created_at
            FROM notifications
            ORDER BY created_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Count unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = FALSE")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Mark one notification as read. Returns `false` for an unknown id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_read(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every notification as read. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_all_read(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE is_read = FALSE")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete one notification. Returns `false` for an unknown id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl NotificationSink for NotificationRepository<'_> {
    async fn append(&self, notification: NewNotification) -> Result<(), BoxError> {
        self.create(&notification).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_notification_message() {
        let n = NewNotification::order("Premium T-Shirt", 3);
        assert_eq!(n.kind, NotificationKind::Order);
        assert_eq!(
            n.message,
            "You have received a new order for Premium T-Shirt (3 items)."
        );
    }

    #[test]
    fn test_stock_notifications_share_kind() {
        assert_eq!(
            NewNotification::low_stock("Mug", 2).kind,
            NotificationKind::Stock
        );
        assert_eq!(
            NewNotification::out_of_stock("Mug").kind,
            NotificationKind::Stock
        );
    }

    #[test]
    fn test_row_with_unknown_kind_is_corruption() {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            message: "m".to_string(),
            kind: "promo".to_string(),
            is_read: false,
            created_at: Utc::now(),
        };
        assert!(matches!(
            Notification::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
