use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use stylewatch::engine::ChangeEvent;
use stylewatch::errors::Result;
use stylewatch::watch::{ChangeSource, Subscription, WatchSpec};

type Slot = Arc<Mutex<Option<mpsc::UnboundedSender<ChangeEvent>>>>;

/// A change source driven by the test instead of the OS.
///
/// While a session is subscribed, [`ManualSource::emit`] delivers events to
/// it; dropping the subscription disconnects.
#[derive(Debug, Default, Clone)]
pub struct ManualSource {
    sender: Slot,
    spec: Arc<Mutex<Option<WatchSpec>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    /// The spec of the current (or last) subscription.
    pub fn last_spec(&self) -> Option<WatchSpec> {
        self.spec.lock().unwrap().clone()
    }

    /// Deliver `event`; false if nobody is subscribed.
    pub fn emit(&self, event: ChangeEvent) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

struct Unsubscribe(Slot);

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.0.lock() {
            slot.take();
        }
    }
}

impl ChangeSource for ManualSource {
    fn subscribe(
        &self,
        spec: &WatchSpec,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<Subscription> {
        *self.sender.lock().unwrap() = Some(events);
        *self.spec.lock().unwrap() = Some(spec.clone());
        Ok(Subscription::new(Unsubscribe(Arc::clone(&self.sender))))
    }
}
