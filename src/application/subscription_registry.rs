//! Reference-counted registry of live push subscriptions.
//!
//! Charts acquire a (symbol, timeframe) key before tuning to a stream
//! and release it on teardown. The transport opens a stream only for
//! the first holder; the registry stores that stream's teardown and
//! runs it when the last holder leaves, so repeated symbol toggles
//! never leak duplicate subscriptions and the closing holder need not
//! be the one that opened the stream.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::logging::LogComponent;
use crate::domain::market_data::SubscriptionKey;
use crate::log_debug;

#[derive(Default)]
struct Entry {
    refs: usize,
    teardown: Option<Box<dyn Fn()>>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RefCell<HashMap<SubscriptionKey, Entry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest. Returns `true` when this is the first holder
    /// and the caller must open the underlying stream and attach its
    /// teardown.
    pub fn acquire(&self, key: &SubscriptionKey) -> bool {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(key.clone()).or_default();
        entry.refs += 1;
        log_debug!(LogComponent::Stream, "acquire {key} refs={}", entry.refs);
        entry.refs == 1
    }

    /// Stores the open stream's teardown under its key. Attaching to an
    /// unheld key is a no-op.
    pub fn attach_teardown(&self, key: &SubscriptionKey, teardown: Box<dyn Fn()>) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(key) {
            entry.teardown = Some(teardown);
        }
    }

    /// Drops interest. When this was the last holder the stored
    /// teardown runs and `true` is returned. Releasing an unheld key
    /// is a no-op.
    pub fn release(&self, key: &SubscriptionKey) -> bool {
        let teardown = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(key) {
                Some(entry) if entry.refs > 1 => {
                    entry.refs -= 1;
                    log_debug!(LogComponent::Stream, "release {key} refs={}", entry.refs);
                    return false;
                }
                Some(_) => {
                    log_debug!(LogComponent::Stream, "release {key} refs=0 (closing)");
                    entries.remove(key).and_then(|entry| entry.teardown)
                }
                None => return false,
            }
        };
        if let Some(teardown) = teardown {
            teardown();
        }
        true
    }

    pub fn is_active(&self, key: &SubscriptionKey) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.entries.borrow().len()
    }
}

thread_local! {
    static GLOBAL: Rc<SubscriptionRegistry> = Rc::new(SubscriptionRegistry::new());
}

/// Process-wide registry shared by every chart instance on the page.
pub fn global_registry() -> Rc<SubscriptionRegistry> {
    GLOBAL.with(Rc::clone)
}
