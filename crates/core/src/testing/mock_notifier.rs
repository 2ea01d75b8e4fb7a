//! Mock notification sink.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::notify::{NotificationSink, NotifyError};
use crate::store::MediaRequest;

/// Sink that records every notified request id.
pub struct MockNotifier {
    notified: Mutex<Vec<String>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            notified: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A sink whose delivery always fails, for pinning that notification
    /// failure never escalates.
    pub fn failing() -> Self {
        Self {
            notified: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Request ids notified so far, in delivery order.
    pub fn notified(&self) -> Vec<String> {
        self.notified.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn media_ready(&self, request: &MediaRequest) -> Result<(), NotifyError> {
        self.notified.lock().unwrap().push(request.id.clone());
        if self.fail {
            return Err(NotifyError::Delivery("scripted delivery failure".into()));
        }
        Ok(())
    }
}
