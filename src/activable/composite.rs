use super::Activable;
use crate::stream::Subscription;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct CompositeInner {
    members: Mutex<Vec<Arc<dyn Activable>>>,
    active: AtomicBool,
    view: Subscription,
}

impl CompositeInner {
    fn snapshot(&self) -> Vec<Arc<dyn Activable>> {
        self.members.lock().clone()
    }

    fn deactivate_all(&self) {
        self.active.store(false, Ordering::Release);
        for member in self.snapshot() {
            member.deactivate();
        }
    }
}

/// Group of activables driven together.
///
/// Members are activated and deactivated in insertion order. A member added
/// while the group is active is activated right away. Once the group's
/// subscription view is disposed, every member is deactivated and the group
/// ignores further activation.
#[derive(Clone)]
pub struct CompositeActivable {
    inner: Arc<CompositeInner>,
}

impl Default for CompositeActivable {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeActivable {
    pub fn new() -> Self {
        let inner = Arc::new(CompositeInner {
            members: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            view: Subscription::new(),
        });
        let weak = Arc::downgrade(&inner);
        inner.view.add(move || {
            if let Some(inner) = weak.upgrade() {
                inner.deactivate_all();
            }
        });
        Self { inner }
    }

    pub fn add<A>(&self, member: A)
    where
        A: Activable + 'static,
    {
        let member: Arc<dyn Activable> = Arc::new(member);
        self.inner.members.lock().push(Arc::clone(&member));
        if self.inner.active.load(Ordering::Acquire) && !self.inner.view.is_disposed() {
            member.activate();
        }
    }

    /// Deactivate every member and forget them all.
    pub fn clear(&self) {
        self.inner.deactivate_all();
        let members = std::mem::take(&mut *self.inner.members.lock());
        tracing::debug!(members = members.len(), "activable group cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Activable for CompositeActivable {
    fn activate(&self) {
        if self.inner.view.is_disposed() {
            tracing::debug!("activate ignored on a disposed activable group");
            return;
        }
        self.inner.active.store(true, Ordering::Release);
        let members = self.inner.snapshot();
        tracing::debug!(members = members.len(), "activating activable group");
        for member in members {
            member.activate();
        }
    }

    fn deactivate(&self) {
        tracing::debug!(members = self.len(), "deactivating activable group");
        self.inner.deactivate_all();
    }

    /// True while the group is active and every member reports activated.
    fn is_activated(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
            && self.inner.snapshot().iter().all(|member| member.is_activated())
    }

    fn as_subscription(&self) -> Subscription {
        self.inner.view.clone()
    }
}

impl fmt::Debug for CompositeActivable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeActivable")
            .field("members", &self.len())
            .field("active", &self.inner.active.load(Ordering::Acquire))
            .finish()
    }
}
