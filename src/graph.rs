//! Dependency graph derived from [`State`]: forward/reverse adjacency and
//! BFS impact layers.
//!
//! Nodes carry names only; edges reference names, never the
//! [`Package`](crate::package::Package) objects themselves, so the graph has
//! no ownership cycles and serializes trivially.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::state::State;

/// A name-keyed dependency graph: every node's edges are its (constraint-
/// stripped) `depends` entries.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl Graph {
    /// Build the forward dependency graph from the current repository
    /// state.
    ///
    /// Each node's edges equal its `depends` list with version constraints
    /// stripped: a token matching `<name>(==|>=|<=|>|<).*` is truncated at
    /// the first comparator. Duplicate edges within one package's list are
    /// preserved, matching the recorded dependency multiset.
    #[must_use]
    pub fn build(state: &State) -> Self {
        let mut nodes = Vec::new();
        let mut edges = HashMap::new();
        for pkg in state.iter() {
            nodes.push(pkg.name.clone());
            let stripped = pkg.depends.iter().map(|d| strip_constraint(d)).collect();
            edges.insert(pkg.name.clone(), stripped);
        }
        Self { nodes, edges }
    }

    /// Node names.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Outgoing edges of `name`, or an empty slice if `name` is not a node
    /// or has no recorded dependencies.
    #[must_use]
    pub fn edges_of(&self, name: &str) -> &[String] {
        self.edges.get(name).map_or(&[], Vec::as_slice)
    }

    /// Reverse every edge, keeping the same node set.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let mut edges: HashMap<String, Vec<String>> =
            self.nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        for (src, dsts) in &self.edges {
            for dst in dsts {
                edges.entry(dst.clone()).or_default().push(src.clone());
            }
        }
        Self {
            nodes: self.nodes.clone(),
            edges,
        }
    }

    /// BFS impact layers from `origin`: level 0 is `{origin}`; level k is
    /// every node first reachable at distance k. A node revisited at a
    /// greater depth is promoted to that depth, so each returned level is
    /// the set of nodes whose *maximum* explored distance equals its index.
    /// Traversal terminates because depth is bounded by the longest simple
    /// path in a finite graph. Each level is returned sorted
    /// lexicographically.
    #[must_use]
    pub fn layers(&self, origin: &str) -> Vec<Vec<String>> {
        let mut depth: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((origin.to_string(), 0));

        while let Some((node, d)) = queue.pop_front() {
            let promoted = depth.get(&node).is_none_or(|&cur| d > cur);
            if !promoted {
                continue;
            }
            depth.insert(node.clone(), d);
            for next in self.edges_of(&node) {
                queue.push_back((next.clone(), d + 1));
            }
        }

        let max_depth = depth.values().copied().max().unwrap_or(0);
        let mut levels: Vec<BTreeSet<String>> = vec![BTreeSet::new(); max_depth + 1];
        for (name, d) in depth {
            levels[d].insert(name);
        }
        levels
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect()
    }
}

fn strip_constraint(token: &str) -> String {
    for (idx, _) in token.char_indices() {
        let candidate = &token[idx..];
        if candidate.starts_with(">=")
            || candidate.starts_with("<=")
            || candidate.starts_with("==")
            || candidate.starts_with('>')
            || candidate.starts_with('<')
        {
            return token[..idx].to_string();
        }
    }
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;

    fn state_with(pkgs: &[(&str, &[&str])]) -> State {
        let mut wal_state = State::new();
        for (name, deps) in pkgs {
            wal_state.put(Package::new(
                *name,
                "1.0-1",
                deps.iter().map(ToString::to_string).collect(),
                false,
                "any",
            ));
        }
        wal_state
    }

    #[test]
    fn strips_version_constraints() {
        assert_eq!(strip_constraint("foo>=1.2"), "foo");
        assert_eq!(strip_constraint("foo==1.2"), "foo");
        assert_eq!(strip_constraint("foo<1.2"), "foo");
        assert_eq!(strip_constraint("foo"), "foo");
    }

    #[test]
    fn build_preserves_duplicate_edges() {
        let state = state_with(&[("root", &["a", "a"]), ("a", &[])]);
        let graph = Graph::build(&state);
        assert_eq!(graph.edges_of("root"), ["a", "a"]);
    }

    #[test]
    fn inverse_reverses_edges() {
        let state = state_with(&[("root", &["a", "b"]), ("a", &["c"]), ("b", &["c"]), ("c", &[])]);
        let graph = Graph::build(&state);
        let inv = graph.inverse();
        let mut dependents = inv.edges_of("c").to_vec();
        dependents.sort();
        assert_eq!(dependents, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn layers_from_scenario() {
        let state = state_with(&[("root", &["a", "b"]), ("a", &["c"]), ("b", &["c"]), ("c", &[])]);
        let graph = Graph::build(&state);
        let inv = graph.inverse();
        let layers = inv.layers("c");
        assert_eq!(
            layers,
            vec![
                vec!["c".to_string()],
                vec!["a".to_string(), "b".to_string()],
                vec!["root".to_string()],
            ]
        );
    }

    #[test]
    fn layers_promote_revisited_nodes_to_max_depth() {
        // root -> a -> target
        // root -> target (direct edge, shorter path explored second doesn't win)
        let state = state_with(&[("root", &["a", "target"]), ("a", &["target"]), ("target", &[])]);
        let graph = Graph::build(&state);
        let layers = graph.layers("root");
        // target is reachable at depth 1 (direct) and depth 2 (via a); the
        // max-depth promotion rule places it in level 2, not level 1.
        assert_eq!(
            layers,
            vec![
                vec!["root".to_string()],
                vec!["a".to_string()],
                vec!["target".to_string()],
            ]
        );
    }
}
