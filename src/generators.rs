//! Generator registry: data-driven iteration axes for one test case.
//!
//! Each generator is keyed by its [`ScopeKey`] and remembers how many values
//! it has and which one is current. The registry behaves like an odometer:
//! [`GeneratorRegistry::advance`] bumps the first generator in discovery
//! order, carrying into the next one when it wraps, so that successive
//! advances enumerate every combination exactly once.

use std::collections::HashMap;

use crate::location::ScopeKey;

/// Iteration state of a single generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorState {
    pub current_index: usize,
    pub total_size: usize,
}

impl GeneratorState {
    fn move_next(&mut self) -> bool {
        self.current_index += 1;
        if self.current_index >= self.total_size {
            self.current_index = 0;
            return false;
        }
        true
    }
}

/// Per-test-case generator bookkeeping.
#[derive(Debug, Default)]
pub struct GeneratorRegistry {
    order: Vec<ScopeKey>,
    states: HashMap<ScopeKey, GeneratorState>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current index of the generator at `key`, registering it with
    /// `total_size` values on first sight.
    pub fn index(&mut self, key: &ScopeKey, total_size: usize) -> usize {
        if let Some(state) = self.states.get(key) {
            return state.current_index;
        }
        self.order.push(key.clone());
        self.states.insert(
            key.clone(),
            GeneratorState {
                current_index: 0,
                total_size,
            },
        );
        0
    }

    /// Moves to the next combination. Returns `false` once every combination
    /// has been visited (all generators are back at index zero).
    pub fn advance(&mut self) -> bool {
        for key in &self.order {
            if let Some(state) = self.states.get_mut(key) {
                if state.move_next() {
                    return true;
                }
            }
        }
        false
    }

    pub fn state(&self, key: &ScopeKey) -> Option<GeneratorState> {
        self.states.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;

    fn key(line: u32) -> ScopeKey {
        ScopeKey::new("generate", SourceLocation::new("generators.rs", line))
    }

    #[test]
    fn empty_registry_has_nothing_to_advance() {
        let mut registry = GeneratorRegistry::new();
        assert!(!registry.advance());
        assert!(registry.is_empty());
    }

    #[test]
    fn single_generator_walks_every_value_once() {
        let mut registry = GeneratorRegistry::new();
        let mut seen = vec![registry.index(&key(1), 3)];
        while registry.advance() {
            seen.push(registry.index(&key(1), 3));
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(registry.state(&key(1)).unwrap().current_index, 0);
    }

    #[test]
    fn two_generators_enumerate_the_product() {
        let mut registry = GeneratorRegistry::new();
        let mut combos = vec![(registry.index(&key(1), 2), registry.index(&key(2), 3))];
        while registry.advance() {
            combos.push((registry.index(&key(1), 2), registry.index(&key(2), 3)));
        }
        assert_eq!(
            combos,
            vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2), (1, 2)]
        );
    }

    #[test]
    fn size_is_fixed_at_first_registration() {
        let mut registry = GeneratorRegistry::new();
        registry.index(&key(1), 2);
        registry.index(&key(1), 10);
        assert_eq!(registry.state(&key(1)).unwrap().total_size, 2);
        assert_eq!(registry.len(), 1);
    }
}
