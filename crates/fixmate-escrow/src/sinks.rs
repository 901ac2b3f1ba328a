//! Best-effort side effects.
//!
//! Notification and analytics failures are logged and swallowed. They never
//! turn a committed financial transition into an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixmate_core::Uid;

use crate::error::SinkError;
use crate::ports::{AnalyticsEvent, AnalyticsSink, Notification, NotificationSink};

/// Fan-out to the notification and analytics sinks.
#[derive(Debug, Clone)]
pub struct SideEffects {
    notifications: Arc<dyn NotificationSink>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl SideEffects {
    pub fn new(notifications: Arc<dyn NotificationSink>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            notifications,
            analytics,
        }
    }

    /// Side effects that only write to the log.
    pub fn tracing_only() -> Self {
        let sink = Arc::new(TracingSink);
        Self::new(sink.clone(), sink)
    }

    /// Send a push notification. Failures are logged.
    pub async fn notify(
        &self,
        recipient: &Uid,
        title: &str,
        body: &str,
        data: impl IntoIterator<Item = (&'static str, String)>,
    ) {
        let notification = Notification {
            recipient: recipient.clone(),
            title: title.to_string(),
            body: body.to_string(),
            data: data
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        };
        if let Err(e) = self.notifications.send_push_notification(notification).await {
            tracing::warn!(recipient = %recipient, title, error = %e, "notification dropped");
        }
    }

    /// Record an analytics event. Failures are logged.
    pub async fn track(
        &self,
        name: &'static str,
        uid: Option<&Uid>,
        role: Option<&'static str>,
        props: serde_json::Value,
    ) {
        let event = AnalyticsEvent {
            name,
            uid: uid.cloned(),
            role,
            props,
        };
        if let Err(e) = self.analytics.log_server_event(event).await {
            tracing::warn!(event = name, error = %e, "analytics event dropped");
        }
    }
}

/// Writes notifications and analytics events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn send_push_notification(&self, n: Notification) -> Result<(), SinkError> {
        tracing::info!(recipient = %n.recipient, title = %n.title, "push notification");
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn log_server_event(&self, e: AnalyticsEvent) -> Result<(), SinkError> {
        tracing::info!(
            event = e.name,
            uid = e.uid.as_ref().map(|u| u.as_str()).unwrap_or("-"),
            props = %e.props,
            "analytics event"
        );
        Ok(())
    }
}
