//! Context switch stack.
//!
//! Actions may substitute the acting identity for the rest of a graph walk.
//! Every push remembers the context it replaced, so removing an entry restores
//! rather than clears. Entries are keyed by the switching entity (the rule)
//! and the action node that pushed them.
//!
//! Removal does not have to be LIFO: taking an entry out of the middle of the
//! stack hands its saved context to the entry above it, so the chain of
//! saved contexts stays intact.

use crate::error::FatalError;

/// One active substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchEntry {
    /// Switching entity, the id of the rule whose action pushed the entry.
    pub entity: String,
    /// Action node instance that pushed the entry.
    pub pushed_by: String,
    /// Context that was active before this push.
    pub previous: Option<String>,
    /// Context this push made active.
    pub context: Option<String>,
}

/// Stack of context substitutions for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStack {
    active: Option<String>,
    entries: Vec<SwitchEntry>,
}

impl ContextStack {
    /// A stack whose base context is `initial` (`None` for anonymous).
    pub fn new(initial: Option<String>) -> Self {
        Self {
            active: initial,
            entries: Vec::new(),
        }
    }

    /// Currently active context.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SwitchEntry] {
        &self.entries
    }

    /// Whether `entity` has any substitution in effect.
    pub fn is_switched_by(&self, entity: &str) -> bool {
        self.entries.iter().any(|e| e.entity == entity)
    }

    /// Make `context` active on behalf of `entity`.
    ///
    /// A second push by the same entity re-bases on the first: its saved
    /// context is whatever the first push made active.
    pub fn push(
        &mut self,
        entity: impl Into<String>,
        pushed_by: impl Into<String>,
        context: Option<String>,
    ) {
        let previous = std::mem::replace(&mut self.active, context.clone());
        self.entries.push(SwitchEntry {
            entity: entity.into(),
            pushed_by: pushed_by.into(),
            previous,
            context,
        });
    }

    /// Remove the most recent entry of `entity`.
    pub fn pop(&mut self, entity: &str) -> Result<SwitchEntry, FatalError> {
        let idx = self
            .entries
            .iter()
            .rposition(|e| e.entity == entity)
            .ok_or_else(|| FatalError::UnbalancedPop {
                entity: entity.to_string(),
            })?;
        Ok(self.remove_at(idx))
    }

    /// Remove the most recent entry pushed by a specific action node.
    pub fn release(&mut self, entity: &str, pushed_by: &str) -> Result<SwitchEntry, FatalError> {
        let idx = self
            .entries
            .iter()
            .rposition(|e| e.entity == entity && e.pushed_by == pushed_by)
            .ok_or_else(|| FatalError::DoubleRelease {
                entity: entity.to_string(),
                pushed_by: pushed_by.to_string(),
            })?;
        Ok(self.remove_at(idx))
    }

    /// Remove every entry of `entity`, newest first. Returns how many were removed.
    pub fn unwind_all(&mut self, entity: &str) -> usize {
        let mut removed = 0;
        while let Some(idx) = self.entries.iter().rposition(|e| e.entity == entity) {
            self.remove_at(idx);
            removed += 1;
        }
        removed
    }

    fn remove_at(&mut self, idx: usize) -> SwitchEntry {
        let entry = self.entries.remove(idx);
        match self.entries.get_mut(idx) {
            // The entry above inherits what this one saved.
            Some(above) => above.previous = entry.previous.clone(),
            None => self.active = entry.previous.clone(),
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: &str) -> Option<String> {
        Some(id.to_string())
    }

    #[test]
    fn test_push_pop_restores() {
        let mut stack = ContextStack::new(ctx("5"));
        stack.push("rule", "a1", ctx("1"));
        assert_eq!(stack.active(), Some("1"));
        let entry = stack.pop("rule").unwrap();
        assert_eq!(entry.previous, ctx("5"));
        assert_eq!(stack.active(), Some("5"));
    }

    #[test]
    fn test_double_pop_is_fatal() {
        let mut stack = ContextStack::new(None);
        stack.push("rule", "a1", ctx("1"));
        stack.pop("rule").unwrap();
        assert_eq!(
            stack.pop("rule").unwrap_err(),
            FatalError::UnbalancedPop { entity: "rule".into() }
        );
    }

    #[test]
    fn test_rebase_by_same_entity() {
        let mut stack = ContextStack::new(ctx("anon"));
        stack.push("rule", "a1", ctx("1"));
        stack.push("rule", "a2", ctx("2"));
        assert_eq!(stack.entries()[1].previous, ctx("1"));
        assert_eq!(stack.unwind_all("rule"), 2);
        assert_eq!(stack.active(), Some("anon"));
    }

    #[test]
    fn test_interleaved_unwind_keeps_other_entity() {
        let mut stack = ContextStack::new(ctx("0"));
        stack.push("a", "n1", ctx("1"));
        stack.push("b", "n2", ctx("2"));
        stack.push("a", "n3", ctx("3"));

        stack.unwind_all("a");
        // b's substitution survives and now restores to the base context.
        assert_eq!(stack.active(), Some("2"));
        assert_eq!(stack.entries()[0].previous, ctx("0"));

        stack.unwind_all("b");
        assert_eq!(stack.active(), Some("0"));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_release_by_node() {
        let mut stack = ContextStack::new(None);
        stack.push("rule", "outer", ctx("1"));
        stack.push("rule", "inner", ctx("2"));
        stack.release("rule", "outer").unwrap();
        assert_eq!(stack.active(), Some("2"));
        stack.release("rule", "inner").unwrap();
        assert_eq!(stack.active(), None);
        assert!(matches!(
            stack.release("rule", "inner"),
            Err(FatalError::DoubleRelease { .. })
        ));
    }

    #[test]
    fn test_unwind_unknown_entity_is_noop() {
        let mut stack = ContextStack::new(ctx("1"));
        assert_eq!(stack.unwind_all("nobody"), 0);
        assert_eq!(stack.active(), Some("1"));
    }
}
