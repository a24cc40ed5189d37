// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tm-adapters: the notifier capability boundary.
//!
//! The core never talks to SMTP, webhooks, or Slack directly; it hands a
//! [`Notification`] to a [`Notifier`] and moves on. Delivery failures are the
//! adapter's problem to log — they never fail the operation that produced
//! the notification.

pub mod notify;

pub use notify::{
    LogNotifier, Notification, Notifier, NotifyError, NotifyEvent, NotifyLevel, RoutingNotifier,
    Transport,
};

#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifier;
