// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tm_core::NotifyMethod;
use tracing::warn;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Severity attached to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

tm_core::simple_display! {
    NotifyLevel {
        Info => "info",
        Warning => "warning",
        Error => "error",
    }
}

/// The closed set of events the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyEvent {
    BackupOk,
    BackupFail,
    DbCredentials,
    DailyReport,
    Preflight,
    IntervalBackup,
}

tm_core::simple_display! {
    NotifyEvent {
        BackupOk => "backup-ok",
        BackupFail => "backup-fail",
        DbCredentials => "db-credentials",
        DailyReport => "daily-report",
        Preflight => "preflight",
        IntervalBackup => "interval-backup",
    }
}

/// One message for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub event: NotifyEvent,
    pub level: NotifyLevel,
    pub subject: String,
    pub body: String,
    /// Per-host recipient override (`--notify` on the roster line).
    pub recipient: Option<String>,
}

impl Notification {
    pub fn new(event: NotifyEvent, level: NotifyLevel, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            event,
            level,
            subject: subject.into(),
            body: body.into(),
            recipient: None,
        }
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

/// Capability for delivering notifications.
#[async_trait]
pub trait Notifier: Clone + Send + Sync + 'static {
    /// Deliver a notification. Implementations log failures; callers never
    /// treat a send error as fatal.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Transport for one delivery channel. Concrete email/webhook/Slack senders
/// live outside the core and plug in here.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        method: NotifyMethod,
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}

/// How long a single transport send may take before it is abandoned.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatches one notification to every configured channel, with optional
/// per-event channel overrides. Routing is a lookup table.
#[derive(Clone)]
pub struct RoutingNotifier {
    transport: Arc<dyn Transport>,
    methods: Vec<NotifyMethod>,
    overrides: Arc<HashMap<NotifyEvent, Vec<NotifyMethod>>>,
}

impl RoutingNotifier {
    pub fn new(transport: Arc<dyn Transport>, methods: Vec<NotifyMethod>) -> Self {
        Self { transport, methods, overrides: Arc::new(HashMap::new()) }
    }

    pub fn with_overrides(
        mut self,
        overrides: HashMap<NotifyEvent, Vec<NotifyMethod>>,
    ) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    fn methods_for(&self, event: NotifyEvent) -> &[NotifyMethod] {
        self.overrides.get(&event).map(Vec::as_slice).unwrap_or(&self.methods)
    }
}

#[async_trait]
impl Notifier for RoutingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        for &method in self.methods_for(notification.event) {
            let send = self.transport.send(method, notification);
            match tokio::time::timeout(SEND_TIMEOUT, send).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(%method, event = %notification.event, error = %e, "notification send failed");
                }
                Err(_) => {
                    warn!(%method, event = %notification.event, "notification send timed out");
                }
            }
        }
        Ok(())
    }
}

/// Default notifier: writes notifications to the daemon log only.
/// Used when no transport is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.level {
            NotifyLevel::Info => tracing::info!(
                event = %notification.event,
                subject = %notification.subject,
                "notification"
            ),
            NotifyLevel::Warning => tracing::warn!(
                event = %notification.event,
                subject = %notification.subject,
                "notification"
            ),
            NotifyLevel::Error => tracing::error!(
                event = %notification.event,
                subject = %notification.subject,
                "notification"
            ),
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Notification, Notifier, NotifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake notifier recording every call for assertions.
    #[derive(Clone, Default)]
    pub struct FakeNotifier {
        calls: Arc<Mutex<Vec<Notification>>>,
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded notifications
        pub fn calls(&self) -> Vec<Notification> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.calls.lock().push(notification.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifier;

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
