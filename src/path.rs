//! Hierarchy bookkeeping: parent-of relation, ancestor paths, and
//! least-common-ancestor exit/enter planning for a transition.
//!
//! Grounded on the original `_PathManager` (`pyeds/fsm.py`), which builds a
//! `path_map` once from a `hierarchy_map` of parent pointers and then
//! computes `exit`/`enter` lists by set-intersecting a source and
//! destination path. The explicit list-trimming shape (as opposed to
//! `statig`'s depth-counting `transition_path`) is closer to the spec's
//! `plan()` contract, which hands callers a concrete `exit_list`/
//! `enter_list` rather than a pair of integers.

use std::collections::{HashMap, HashSet};

use crate::error::ConfigError;

/// Owns the state hierarchy and computes transition paths through it.
///
/// Registration happens via [`PathManager::add`] during machine setup;
/// [`PathManager::build`] freezes the hierarchy and computes every state's
/// ancestor chain once. All later queries are pure lookups.
pub struct PathManager {
    parents: HashMap<String, Option<String>>,
    ancestors: HashMap<String, Vec<String>>,
    depth: usize,
    built: bool,
    /// Scratch list the dispatcher accumulates exits into while bubbling up
    /// the ancestor chain (§4.4.2 of the spec). Reset at the start of every
    /// dispatch cycle via [`PathManager::take_pend_exit`].
    pend_exit: Vec<String>,
}

impl PathManager {
    pub fn new() -> Self {
        PathManager {
            parents: HashMap::new(),
            ancestors: HashMap::new(),
            depth: 0,
            built: false,
            pend_exit: Vec::new(),
        }
    }

    /// Register one state. Must be called before [`PathManager::build`].
    pub fn add(&mut self, name: &str, parent: Option<&str>) -> Result<(), ConfigError> {
        if self.built {
            return Err(ConfigError::AlreadyBuilt);
        }
        if self.parents.contains_key(name) {
            return Err(ConfigError::DuplicateState(name.to_string()));
        }
        self.parents
            .insert(name.to_string(), parent.map(|p| p.to_string()));
        Ok(())
    }

    /// Freeze the hierarchy: validate parents, detect cycles, and compute
    /// each state's ancestor chain (root-to-leaf order reversed, i.e.
    /// `[self, parent, grandparent, ..., root]`).
    pub fn build(&mut self) -> Result<(), ConfigError> {
        if self.built {
            return Err(ConfigError::AlreadyBuilt);
        }
        for (state, parent) in &self.parents {
            if let Some(parent) = parent {
                if !self.parents.contains_key(parent) {
                    return Err(ConfigError::DanglingParent {
                        state: state.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        let names: Vec<String> = self.parents.keys().cloned().collect();
        for name in &names {
            let chain = self.build_chain(name)?;
            self.depth = self.depth.max(chain.len());
            self.ancestors.insert(name.clone(), chain);
        }
        self.built = true;
        Ok(())
    }

    fn build_chain(&self, start: &str) -> Result<Vec<String>, ConfigError> {
        let mut chain = vec![start.to_string()];
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(start.to_string());
        let mut cur = start.to_string();
        loop {
            match self.parents.get(&cur).and_then(|p| p.clone()) {
                Some(parent) => {
                    if !seen.insert(parent.clone()) {
                        return Err(ConfigError::CyclicHierarchy(parent));
                    }
                    chain.push(parent.clone());
                    cur = parent;
                }
                None => break,
            }
        }
        Ok(chain)
    }

    /// The hierarchy's depth: the longest ancestor chain, roots at depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The immediate parent of `name`, or `None` if it is a root.
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.ancestors.get(name)?.get(1).map(|s| s.as_str())
    }

    /// `[name, parent, grandparent, ..., root]`.
    pub fn ancestors(&self, name: &str) -> &[String] {
        self.ancestors
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Every registered state name.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(|s| s.as_str())
    }

    /// Append `name` to the pending-exit scratch list (called while bubbling
    /// up the ancestor chain looking for a handler).
    pub fn push_pend_exit(&mut self, name: &str) {
        self.pend_exit.push(name.to_string());
    }

    /// Drain and return the pending-exit scratch list, resetting it.
    pub fn take_pend_exit(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pend_exit)
    }

    /// Compute the exit/enter lists for a transition from `source` to
    /// `destination`. `exit_list` is source-to-root order (excluding the
    /// intersection with the destination's path); `enter_list` is
    /// root-to-destination order.
    ///
    /// A self-transition (`source == destination`) yields empty lists here,
    /// since the two paths are identical and their intersection covers the
    /// whole thing. The dispatcher never special-cases this (§4.4.3,
    /// decision D-1 in DESIGN.md): the only exits a self-transition produces
    /// are whatever ancestors were already queued into `pend_exit` while
    /// bubbling up to find the handler.
    pub fn plan(&self, source: &str, destination: &str) -> (Vec<String>, Vec<String>) {
        let src_path = self.ancestors(source);
        let dst_path = self.ancestors(destination);
        let intersection: HashSet<&str> = src_path
            .iter()
            .map(|s| s.as_str())
            .collect::<HashSet<_>>()
            .intersection(&dst_path.iter().map(|s| s.as_str()).collect::<HashSet<_>>())
            .copied()
            .collect();

        let exit_list: Vec<String> = src_path
            .iter()
            .filter(|s| !intersection.contains(s.as_str()))
            .cloned()
            .collect();
        let mut enter_list: Vec<String> = dst_path
            .iter()
            .filter(|s| !intersection.contains(s.as_str()))
            .cloned()
            .collect();
        enter_list.reverse();
        (exit_list, enter_list)
    }
}

impl Default for PathManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_machine() -> PathManager {
        let mut pm = PathManager::new();
        for i in 1..=7 {
            pm.add(&format!("StateA{i}"), None).unwrap();
        }
        pm.build().unwrap();
        pm
    }

    fn hsm() -> PathManager {
        let mut pm = PathManager::new();
        pm.add("S", None).unwrap();
        pm.add("S1", Some("S")).unwrap();
        pm.add("S11", Some("S1")).unwrap();
        pm.build().unwrap();
        pm
    }

    #[test]
    fn depth_formula_holds() {
        let pm = hsm();
        assert_eq!(pm.ancestors("S").len(), 1);
        assert_eq!(pm.ancestors("S1").len(), 2);
        assert_eq!(pm.ancestors("S11").len(), 3);
        assert_eq!(pm.depth(), 3);
    }

    #[test]
    fn flat_states_are_all_depth_one() {
        let pm = flat_machine();
        assert_eq!(pm.depth(), 1);
        for i in 1..=7 {
            assert_eq!(pm.ancestors(&format!("StateA{i}")).len(), 1);
        }
    }

    #[test]
    fn plan_exit_enter_disjoint_and_covers_divergent_prefix() {
        let pm = hsm();
        let (exit, enter) = pm.plan("S11", "S1");
        assert_eq!(exit, vec!["S11".to_string()]);
        assert!(enter.is_empty());

        let (exit, enter) = pm.plan("S1", "S11");
        assert!(exit.is_empty());
        assert_eq!(enter, vec!["S11".to_string()]);

        for s in &exit {
            assert!(!enter.contains(s));
        }
    }

    #[test]
    fn plan_between_disjoint_trees_exits_and_enters_everything() {
        let mut pm = PathManager::new();
        pm.add("A", None).unwrap();
        pm.add("B", None).unwrap();
        pm.build().unwrap();
        let (exit, enter) = pm.plan("A", "B");
        assert_eq!(exit, vec!["A".to_string()]);
        assert_eq!(enter, vec!["B".to_string()]);
    }

    #[test]
    fn build_rejects_dangling_parent() {
        let mut pm = PathManager::new();
        pm.add("Child", Some("Ghost")).unwrap();
        assert_eq!(
            pm.build(),
            Err(ConfigError::DanglingParent {
                state: "Child".into(),
                parent: "Ghost".into(),
            })
        );
    }

    #[test]
    fn build_runs_exactly_once() {
        let mut pm = flat_machine();
        assert_eq!(pm.build(), Err(ConfigError::AlreadyBuilt));
    }

    #[test]
    fn pend_exit_is_scratch_space() {
        let mut pm = hsm();
        pm.push_pend_exit("S11");
        pm.push_pend_exit("S1");
        assert_eq!(pm.take_pend_exit(), vec!["S11", "S1"]);
        assert!(pm.take_pend_exit().is_empty());
    }
}
