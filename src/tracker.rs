//! The tracker tree.
//!
//! A test body is run to completion by invoking it repeatedly. Each
//! invocation (a *pass*) walks the same tree of named scopes; the tracker
//! records which scopes have already completed so that every pass opens at
//! most one new leaf and skips everything that finished earlier.
//!
//! Nodes live in an arena owned by [`TrackerContext`] and are addressed by
//! [`NodeId`]. Parents are plain indices, so there is no ownership cycle and
//! the whole tree is dropped in one go by [`TrackerContext::end_run`].
//!
//! The tree is rebuilt identically on every pass only if the test body
//! discovers the same scopes in the same order each time. That determinism is
//! a precondition of the engine; it is not checked.

use serde::Serialize;

use crate::errors::EngineError;
use crate::location::ScopeKey;

/// Lifecycle of a single tracked scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    /// Open in the current pass with no child opened yet.
    Executing,
    /// Open in the current pass and one of its children was opened.
    ExecutingChildren,
    /// A child failed; the node must be visited again to reach its siblings.
    NeedsAnotherRun,
    CompletedSuccessfully,
    Failed,
}

impl RunState {
    pub fn is_complete(self) -> bool {
        matches!(self, RunState::CompletedSuccessfully | RunState::Failed)
    }

    pub fn is_open(self) -> bool {
        self != RunState::NotStarted && !self.is_complete()
    }
}

/// Index of a node inside its [`TrackerContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct TrackerNode {
    key: ScopeKey,
    state: RunState,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    NotStarted,
    Executing,
    CompletedCycle,
}

/// Shape of a tracker subtree, used to compare trees across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeShape {
    pub name: String,
    pub state: RunState,
    pub children: Vec<TreeShape>,
}

impl TreeShape {
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeShape::node_count).sum::<usize>()
    }
}

// ============================================================================
// TRACKER CONTEXT
// ============================================================================

/// Owner of the tracker arena and of the per-pass cursor.
#[derive(Debug)]
pub struct TrackerContext {
    nodes: Vec<TrackerNode>,
    root: Option<NodeId>,
    current: Option<NodeId>,
    cycle: CycleState,
}

impl Default for TrackerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerContext {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            current: None,
            cycle: CycleState::NotStarted,
        }
    }

    /// Discards any previous tree and creates a fresh synthetic root.
    pub fn start_run(&mut self) -> NodeId {
        self.nodes.clear();
        self.nodes.push(TrackerNode {
            key: ScopeKey::new("{root}", Default::default()),
            state: RunState::NotStarted,
            parent: None,
            children: Vec::new(),
        });
        let root = NodeId(0);
        self.root = Some(root);
        self.current = None;
        self.cycle = CycleState::Executing;
        root
    }

    pub fn end_run(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.current = None;
        self.cycle = CycleState::NotStarted;
    }

    /// Begins a pass: the cursor goes back to the root.
    pub fn start_cycle(&mut self) -> Result<(), EngineError> {
        let root = self.root.ok_or(EngineError::NoActiveRun)?;
        self.current = Some(root);
        self.cycle = CycleState::Executing;
        Ok(())
    }

    /// Marks that a scope closed in this pass; nothing else opens until the next one.
    pub fn complete_cycle(&mut self) {
        self.cycle = CycleState::CompletedCycle;
    }

    pub fn completed_cycle(&self) -> bool {
        self.cycle == CycleState::CompletedCycle
    }

    pub fn is_running(&self) -> bool {
        self.root.is_some()
    }

    pub fn current(&self) -> Result<NodeId, EngineError> {
        self.current.ok_or(EngineError::NoActiveRun)
    }

    /// Returns the child of the current node for `key`, creating it on first
    /// discovery, and opens it if this pass may still enter a new scope.
    pub fn acquire(&mut self, key: &ScopeKey) -> Result<NodeId, EngineError> {
        let parent = self.current()?;
        let id = match self.find_child(parent, key) {
            Some(existing) => existing,
            None => {
                let id = NodeId(self.nodes.len());
                self.nodes.push(TrackerNode {
                    key: key.clone(),
                    state: RunState::NotStarted,
                    parent: Some(parent),
                    children: Vec::new(),
                });
                self.nodes[parent.0].children.push(id);
                id
            }
        };
        if !self.completed_cycle() && !self.state(id).is_complete() {
            self.open(id);
        }
        Ok(id)
    }

    fn find_child(&self, parent: NodeId, key: &ScopeKey) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].key == *key)
    }

    fn open(&mut self, id: NodeId) {
        self.nodes[id.0].state = RunState::Executing;
        self.current = Some(id);
        if let Some(parent) = self.nodes[id.0].parent {
            self.open_child(parent);
        }
    }

    fn open_child(&mut self, id: NodeId) {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if self.nodes[node.0].state == RunState::ExecutingChildren {
                break;
            }
            self.nodes[node.0].state = RunState::ExecutingChildren;
            cursor = self.nodes[node.0].parent;
        }
    }

    /// Leaves a scope normally.
    ///
    /// Any descendants still open are closed first. A node that opened no
    /// child, or whose last child is complete, becomes
    /// `CompletedSuccessfully`; otherwise it stays open for a later pass.
    pub fn close(&mut self, id: NodeId) -> Result<(), EngineError> {
        while let Some(current) = self.current {
            if current == id || !self.is_descendant(current, id) {
                break;
            }
            self.close(current)?;
        }

        let state = self.state(id);
        match state {
            RunState::NotStarted | RunState::CompletedSuccessfully | RunState::Failed => {
                return Err(EngineError::illogical("close", &self.nodes[id.0].key, state));
            }
            RunState::NeedsAnotherRun => {}
            RunState::Executing => {
                self.nodes[id.0].state = RunState::CompletedSuccessfully;
            }
            RunState::ExecutingChildren => {
                let last_complete = self.nodes[id.0]
                    .children
                    .last()
                    .map_or(true, |last| self.state(*last).is_complete());
                if last_complete {
                    self.nodes[id.0].state = RunState::CompletedSuccessfully;
                }
            }
        }
        self.move_to_parent(id);
        self.complete_cycle();
        Ok(())
    }

    /// Leaves a scope because it failed. Its parent needs another pass so
    /// later siblings still get their turn.
    pub fn fail(&mut self, id: NodeId) {
        self.nodes[id.0].state = RunState::Failed;
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].state = RunState::NeedsAnotherRun;
        }
        self.move_to_parent(id);
        self.complete_cycle();
    }

    fn move_to_parent(&mut self, id: NodeId) {
        self.current = self.nodes[id.0].parent;
    }

    fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.nodes[node.0].parent;
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = self.nodes[parent.0].parent;
        }
        false
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self, id: NodeId) -> RunState {
        self.nodes[id.0].state
    }

    pub fn key(&self, id: NodeId) -> &ScopeKey {
        &self.nodes[id.0].key
    }

    pub fn is_open(&self, id: NodeId) -> bool {
        self.state(id).is_open()
    }

    pub fn is_complete(&self, id: NodeId) -> bool {
        self.state(id).is_complete()
    }

    pub fn is_successfully_completed(&self, id: NodeId) -> bool {
        self.state(id) == RunState::CompletedSuccessfully
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn shape(&self, id: NodeId) -> TreeShape {
        let node = &self.nodes[id.0];
        TreeShape {
            name: node.key.name.clone(),
            state: node.state,
            children: node.children.iter().map(|c| self.shape(*c)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;

    fn key(name: &str) -> ScopeKey {
        ScopeKey::new(name, SourceLocation::new("tracker.rs", 1))
    }

    /// A body with sections A{A1, A2} and B, driven the way the run context does.
    fn pass(ctx: &mut TrackerContext, entered: &mut Vec<&'static str>) -> NodeId {
        ctx.start_cycle().unwrap();
        let test = ctx.acquire(&key("test")).unwrap();

        let a = ctx.acquire(&key("A")).unwrap();
        if ctx.is_open(a) {
            let a1 = ctx.acquire(&key("A1")).unwrap();
            if ctx.is_open(a1) {
                entered.push("A1");
                ctx.close(a1).unwrap();
            }
            let a2 = ctx.acquire(&key("A2")).unwrap();
            if ctx.is_open(a2) {
                entered.push("A2");
                ctx.close(a2).unwrap();
            }
            ctx.close(a).unwrap();
        }
        let b = ctx.acquire(&key("B")).unwrap();
        if ctx.is_open(b) {
            entered.push("B");
            ctx.close(b).unwrap();
        }
        ctx.close(test).unwrap();
        test
    }

    #[test]
    fn each_leaf_runs_exactly_once() {
        let mut ctx = TrackerContext::new();
        ctx.start_run();
        let mut entered = Vec::new();
        let mut passes = 0;
        loop {
            passes += 1;
            let test = pass(&mut ctx, &mut entered);
            if ctx.is_successfully_completed(test) {
                break;
            }
            assert!(passes < 10, "tracker never completed");
        }
        assert_eq!(passes, 3);
        assert_eq!(entered, vec!["A1", "A2", "B"]);
    }

    #[test]
    fn tree_shape_is_reproducible() {
        let mut shapes = Vec::new();
        for _ in 0..2 {
            let mut ctx = TrackerContext::new();
            let root = ctx.start_run();
            let mut entered = Vec::new();
            loop {
                let test = pass(&mut ctx, &mut entered);
                if ctx.is_successfully_completed(test) {
                    break;
                }
            }
            shapes.push(ctx.shape(root));
        }
        assert_eq!(shapes[0], shapes[1]);
        assert_eq!(shapes[0].node_count(), 6);
        let names: Vec<_> = shapes[0].children[0]
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn failed_branch_is_not_retried_but_siblings_run() {
        let mut ctx = TrackerContext::new();
        ctx.start_run();
        let mut runs = Vec::new();
        for _ in 0..5 {
            ctx.start_cycle().unwrap();
            let test = ctx.acquire(&key("test")).unwrap();
            let first = ctx.acquire(&key("first")).unwrap();
            if ctx.is_open(first) {
                runs.push("first");
                ctx.fail(first);
            }
            let second = ctx.acquire(&key("second")).unwrap();
            if ctx.is_open(second) {
                runs.push("second");
                ctx.close(second).unwrap();
            }
            ctx.close(test).unwrap();
            if ctx.is_successfully_completed(test) {
                break;
            }
        }
        assert_eq!(runs, vec!["first", "second"]);
    }

    #[test]
    fn closing_a_completed_node_is_illogical() {
        let mut ctx = TrackerContext::new();
        ctx.start_run();
        ctx.start_cycle().unwrap();
        let test = ctx.acquire(&key("test")).unwrap();
        ctx.close(test).unwrap();
        let err = ctx.close(test).unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllogicalTrackerState {
                state: RunState::CompletedSuccessfully,
                ..
            }
        ));
    }

    #[test]
    fn close_unwinds_open_descendants() {
        let mut ctx = TrackerContext::new();
        ctx.start_run();
        ctx.start_cycle().unwrap();
        let test = ctx.acquire(&key("test")).unwrap();
        let inner = ctx.acquire(&key("inner")).unwrap();
        assert_eq!(ctx.current().unwrap(), inner);
        ctx.close(test).unwrap();
        assert!(ctx.is_successfully_completed(inner));
        assert!(ctx.is_successfully_completed(test));
    }

    #[test]
    fn acquire_without_run_is_an_error() {
        let mut ctx = TrackerContext::new();
        assert!(matches!(
            ctx.acquire(&key("test")),
            Err(EngineError::NoActiveRun)
        ));
    }
}
