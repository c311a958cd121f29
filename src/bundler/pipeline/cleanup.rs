//! Registry of compensating actions (the undo stack).
//!
//! Ids are kept in registration order next to an id-keyed store. Unwinding
//! pops from the end of the order, so the most recently acquired resource is
//! released first. An id is removed from both structures when it is consumed,
//! whether by unwind or by an on-demand run.

use super::step::BoxFuture;
use crate::bundler::Result;
use std::collections::HashMap;
use std::future::Future;

/// Body of a cleanup action. The flag tells whether the run has already
/// failed, so the action can skip expensive finalization.
pub type CleanupAction = Box<dyn FnOnce(bool) -> BoxFuture<'static, Result<()>> + Send>;

/// A named compensating action.
pub struct CleanupStep {
    pub(crate) title: String,
    pub(crate) action: CleanupAction,
}

impl CleanupStep {
    pub(crate) fn new<F, Fut>(title: String, action: F) -> Self
    where
        F: FnOnce(bool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            title,
            action: Box::new(move |has_errored| -> BoxFuture<'static, Result<()>> {
                Box::pin(action(has_errored))
            }),
        }
    }

    /// Title shown in progress output while unwinding.
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl std::fmt::Debug for CleanupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupStep")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub(crate) struct CleanupRegistry {
    order: Vec<String>,
    store: HashMap<String, CleanupStep>,
}

impl CleanupRegistry {
    /// Registers `step` under `id`.
    ///
    /// # Panics
    ///
    /// If `id` is still registered. Overwriting would leak the first resource.
    pub(crate) fn register(&mut self, id: String, step: CleanupStep) {
        assert!(
            !self.store.contains_key(&id),
            "cleanup step `{id}` is already registered"
        );
        log::debug!("Registered cleanup `{}` ({})", id, step.title);
        self.order.push(id.clone());
        self.store.insert(id, step);
    }

    /// Removes and returns the step registered under `id`.
    ///
    /// # Panics
    ///
    /// If `id` is unknown or was already consumed.
    pub(crate) fn take(&mut self, id: &str) -> CleanupStep {
        let Some(idx) = self.order.iter().position(|known| known == id) else {
            panic!("no cleanup step with id: {id}");
        };
        self.order.remove(idx);
        match self.store.remove(id) {
            Some(step) => step,
            None => panic!("cleanup registry out of sync for id: {id}"),
        }
    }

    /// Removes and returns the most recently registered step.
    pub(crate) fn pop_latest(&mut self) -> Option<(String, CleanupStep)> {
        let id = self.order.pop()?;
        let step = self.store.remove(&id)?;
        Some((id, step))
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.store.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(title: &str) -> CleanupStep {
        CleanupStep::new(title.to_string(), |_| async { Ok(()) })
    }

    #[test]
    fn pops_in_reverse_registration_order() {
        let mut registry = CleanupRegistry::default();
        registry.register("a".into(), noop("A"));
        registry.register("b".into(), noop("B"));
        registry.register("c".into(), noop("C"));

        let order: Vec<String> = std::iter::from_fn(|| registry.pop_latest())
            .map(|(id, _)| id)
            .collect();
        assert_eq!(order, ["c", "b", "a"]);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn take_removes_from_both_structures() {
        let mut registry = CleanupRegistry::default();
        registry.register("mount".into(), noop("Unmount"));
        registry.register("image".into(), noop("Remove image"));

        let taken = registry.take("mount");
        assert_eq!(taken.title(), "Unmount");
        assert!(!registry.contains("mount"));
        assert_eq!(registry.len(), 1);

        // Once consumed the id may be registered again.
        registry.register("mount".into(), noop("Unmount again"));
        assert_eq!(registry.pop_latest().map(|(id, _)| id).as_deref(), Some("mount"));
    }

    #[test]
    #[should_panic(expected = "no cleanup step with id: missing")]
    fn taking_unknown_id_panics() {
        let mut registry = CleanupRegistry::default();
        registry.take("missing");
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut registry = CleanupRegistry::default();
        registry.register("x".into(), noop("X"));
        registry.register("x".into(), noop("X again"));
    }
}
