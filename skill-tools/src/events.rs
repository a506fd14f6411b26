//! Event bus that keeps independent registries in step.
//!
//! Registries are announced with [`ToolEvents::publish_registry`] and held
//! weakly. When a skill is created or removed through one registry, the change
//! is published and every other announced registry is asked to reload, so no
//! registry needs a direct reference to another.
//!
//! Subscribers run synchronously on the publishing thread. A subscriber that
//! returns an error or panics is logged and skipped; the rest still run.

use std::error::Error as StdError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use skill_primitives::{RegistryId, SkillName};
use tracing::{debug, error, warn};

use crate::registry::ToolRegistry;

/// Result returned by event subscribers.
pub type SubscriberResult = Result<(), Box<dyn StdError + Send + Sync>>;

type RegistrySubscriber = Arc<dyn Fn(&Arc<ToolRegistry>) -> SubscriberResult + Send + Sync>;
type ChangeSubscriber = Arc<dyn Fn(&ToolChangeEvent) -> SubscriberResult + Send + Sync>;

/// What happened to a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The skill was created.
    Created,
    /// The skill was removed.
    Removed,
}

/// Notification that the set of available tools changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChangeEvent {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Affected skill.
    pub skill: SkillName,
    /// Registry through which the change was made.
    pub origin: RegistryId,
}

impl ToolChangeEvent {
    /// A skill was created through `origin`.
    #[must_use]
    pub fn created(skill: SkillName, origin: RegistryId) -> Self {
        Self {
            kind: ChangeKind::Created,
            skill,
            origin,
        }
    }

    /// A skill was removed through `origin`.
    #[must_use]
    pub fn removed(skill: SkillName, origin: RegistryId) -> Self {
        Self {
            kind: ChangeKind::Removed,
            skill,
            origin,
        }
    }
}

/// Registry and change subscribers, plus the registries announced so far.
#[derive(Default)]
pub struct ToolEvents {
    registries: RwLock<Vec<Weak<ToolRegistry>>>,
    registry_subscribers: RwLock<Vec<RegistrySubscriber>>,
    change_subscribers: RwLock<Vec<ChangeSubscriber>>,
}

impl std::fmt::Debug for ToolEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEvents")
            .field("registries", &self.registries().len())
            .field(
                "registry_subscribers",
                &read(&self.registry_subscribers).len(),
            )
            .field("change_subscribers", &read(&self.change_subscribers).len())
            .finish()
    }
}

impl ToolEvents {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to newly announced registries.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&Arc<ToolRegistry>) -> SubscriberResult + Send + Sync + 'static,
    {
        write(&self.registry_subscribers).push(Arc::new(subscriber));
    }

    /// Subscribes to skill change events.
    pub fn subscribe_change<F>(&self, subscriber: F)
    where
        F: Fn(&ToolChangeEvent) -> SubscriberResult + Send + Sync + 'static,
    {
        write(&self.change_subscribers).push(Arc::new(subscriber));
    }

    /// Announces a registry and notifies registry subscribers.
    ///
    /// Returns how many subscribers completed without error. Announcing the
    /// same registry twice only tracks it once.
    pub fn publish_registry(&self, registry: &Arc<ToolRegistry>) -> usize {
        {
            let mut registries = write(&self.registries);
            registries.retain(|weak| weak.strong_count() > 0);
            let known = registries
                .iter()
                .filter_map(Weak::upgrade)
                .any(|existing| existing.id() == registry.id());
            if !known {
                registries.push(Arc::downgrade(registry));
            }
        }

        let subscribers = read(&self.registry_subscribers).clone();
        let delivered = subscribers
            .iter()
            .filter(|subscriber| deliver("registry", || subscriber(registry)))
            .count();
        debug!(registry = %registry.id(), delivered, "registry published");
        delivered
    }

    /// Notifies change subscribers, returning how many completed without error.
    pub fn publish_change(&self, event: &ToolChangeEvent) -> usize {
        let subscribers = read(&self.change_subscribers).clone();
        let delivered = subscribers
            .iter()
            .filter(|subscriber| deliver("change", || subscriber(event)))
            .count();
        debug!(
            kind = ?event.kind,
            skill = %event.skill,
            origin = %event.origin,
            delivered,
            "tool change published"
        );
        delivered
    }

    /// Reloads every live announced registry except `excluding`.
    ///
    /// Returns how many registries reloaded. A registry whose reload panics is
    /// logged and skipped.
    pub fn broadcast_reload(&self, excluding: RegistryId) -> usize {
        let targets: Vec<Arc<ToolRegistry>> = self
            .registries()
            .into_iter()
            .filter(|registry| registry.id() != excluding)
            .collect();

        let reloaded = targets
            .iter()
            .filter(|registry| {
                deliver("reload", || {
                    registry.reload();
                    Ok(())
                })
            })
            .count();
        debug!(%excluding, reloaded, "reload broadcast");
        reloaded
    }

    /// Returns the announced registries that are still alive.
    #[must_use]
    pub fn registries(&self) -> Vec<Arc<ToolRegistry>> {
        read(&self.registries)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

fn deliver(channel: &'static str, call: impl FnOnce() -> SubscriberResult) -> bool {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(channel, error = %err, "event subscriber failed");
            false
        }
        Err(_) => {
            error!(channel, "event subscriber panicked");
            false
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn skill(name: &str) -> SkillName {
        SkillName::new(name).unwrap()
    }

    #[test]
    fn failing_subscribers_do_not_block_others() {
        let events = ToolEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        events.subscribe_change(|_| Err("broken".into()));
        events.subscribe_change(|_| panic!("worse"));
        let sink = Arc::clone(&seen);
        events.subscribe_change(move |event| {
            sink.lock().unwrap().push(event.skill.to_string());
            Ok(())
        });

        let event = ToolChangeEvent::created(skill("math"), RegistryId::random());
        assert_eq!(events.publish_change(&event), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["math".to_owned()]);
    }

    #[test]
    fn registry_subscribers_see_each_published_registry() {
        let events = ToolEvents::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        events.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let registry = Arc::new(ToolRegistry::new());
        events.publish_registry(&registry);
        events.publish_registry(&registry);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(events.registries().len(), 1);
    }

    #[test]
    fn broadcast_skips_the_origin_and_dropped_registries() {
        let events = ToolEvents::new();
        let reloads = Arc::new(Mutex::new(Vec::new()));

        let registries: Vec<Arc<ToolRegistry>> =
            (0..3).map(|_| Arc::new(ToolRegistry::new())).collect();
        for registry in &registries {
            let log = Arc::clone(&reloads);
            registry.on_reload(move |registry| log.lock().unwrap().push(registry.id()));
            events.publish_registry(registry);
        }
        let dropped = Arc::new(ToolRegistry::new());
        events.publish_registry(&dropped);
        drop(dropped);

        let origin = registries[0].id();
        assert_eq!(events.broadcast_reload(origin), 2);
        let reloaded = reloads.lock().unwrap().clone();
        assert_eq!(reloaded, vec![registries[1].id(), registries[2].id()]);
    }

    #[test]
    fn panicking_reload_is_contained() {
        let events = ToolEvents::new();
        let bad = Arc::new(ToolRegistry::new());
        bad.on_reload(|_| panic!("reload failed"));
        let good = Arc::new(ToolRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        good.on_reload(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        events.publish_registry(&bad);
        events.publish_registry(&good);

        assert_eq!(events.broadcast_reload(RegistryId::random()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
