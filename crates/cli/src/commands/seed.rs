//! Database seeding commands.

use tracing::info;

use stablemart_storefront::notifications::{NewNotification, NotificationRepository};

/// Insert the welcome notification a fresh merchant dashboard shows.
///
/// Skipped when the feed already has entries, so reruns are harmless.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the insert fails.
pub async fn welcome() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let repo = NotificationRepository::new(&pool);

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
        .fetch_one(&pool)
        .await?;
    if existing > 0 {
        info!("Notification feed is not empty, skipping welcome seed");
        return Ok(());
    }

    let notification = repo
        .create(&NewNotification::system(
            "Welcome to Stablemart",
            "Your store is live. Orders and stock alerts will show up here.",
        ))
        .await?;
    info!(id = %notification.id, "Welcome notification created");
    Ok(())
}
