//! Notification ingestion endpoint.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::notification::Notification;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct NotificationAccepted {
    pub result: &'static str,
}

/// POST /notification - queue a notification for delivery
///
/// Responds once the notification is buffered, which may take a while when
/// the primary queue is full. Delivery itself happens in the background.
pub async fn create_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotificationAccepted>> {
    let notification: Notification = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Error parsing request body: {}", e)))?;

    tracing::info!(
        notification_id = %notification.id,
        event_type = %notification.event_type,
        "Received notification"
    );

    state.dispatcher.enqueue(notification).await?;

    Ok(Json(NotificationAccepted { result: "ok" }))
}
