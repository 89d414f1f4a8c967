//! Directed dependency graph with cycle detection and topological ordering.
//!
//! Edges mean "depends on": dependencies sort before their dependents.
//! Traversal is an iterative DFS with white/gray/black colors, so deep
//! chains never exhaust the call stack.

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Color states for DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the DFS stack.
    Gray,
    /// Finished.
    Black,
}

/// Every cycle found in a graph, each ordered along its edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycles<K>(pub Vec<Vec<K>>);

impl<K: fmt::Display> fmt::Display for Cycles<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cycle) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            write!(f, "[{}]", names.join(", "))?;
        }
        Ok(())
    }
}

pub struct Graph<K> {
    nodes: Vec<K>,
    edges: Vec<Vec<usize>>,
}

impl<K: Clone + Eq + Hash> Graph<K> {
    /// Build a graph from `nodes` and an edge selector.
    ///
    /// Duplicate nodes keep their first position. Edges to nodes outside the
    /// graph are ignored and duplicate edges collapse.
    pub fn new<I, F>(nodes: impl IntoIterator<Item = K>, mut dependencies: F) -> Self
    where
        F: FnMut(&K) -> I,
        I: IntoIterator<Item = K>,
    {
        let mut index: FxHashMap<K, usize> = FxHashMap::default();
        let mut unique = Vec::new();
        for node in nodes {
            if !index.contains_key(&node) {
                index.insert(node.clone(), unique.len());
                unique.push(node);
            }
        }

        let edges = unique
            .iter()
            .map(|node| {
                let mut targets: Vec<usize> = Vec::new();
                for dep in dependencies(node) {
                    if let Some(&i) = index.get(&dep)
                        && !targets.contains(&i)
                    {
                        targets.push(i);
                    }
                }
                targets
            })
            .collect();

        Self {
            nodes: unique,
            edges,
        }
    }

    /// Every cycle in the graph; empty means the graph is acyclic.
    ///
    /// Self-loops are reported as one-element cycles.
    #[allow(dead_code)]
    pub fn find_cycles(&self) -> Vec<Vec<K>> {
        let (_, cycles) = self.traverse();
        self.resolve_cycles(cycles)
    }

    /// Dependencies before dependents, ties broken by input order.
    pub fn topological_sort(&self) -> Result<Vec<K>, Cycles<K>> {
        let (order, cycles) = self.traverse();
        if !cycles.is_empty() {
            return Err(Cycles(self.resolve_cycles(cycles)));
        }
        Ok(order.into_iter().map(|i| self.nodes[i].clone()).collect())
    }

    fn resolve_cycles(&self, cycles: Vec<Vec<usize>>) -> Vec<Vec<K>> {
        cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| self.nodes[i].clone()).collect())
            .collect()
    }

    /// Post-order DFS over all roots in input order.
    ///
    /// Returns the finish order (a valid topological order when acyclic) and
    /// every back edge turned into a cycle.
    fn traverse(&self) -> (Vec<usize>, Vec<Vec<usize>>) {
        let n = self.nodes.len();
        let mut colors = vec![Color::White; n];
        let mut order = Vec::with_capacity(n);
        let mut cycles = Vec::new();
        // (node, index of the next edge to follow)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if colors[root] != Color::White {
                continue;
            }
            colors[root] = Color::Gray;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let Some(&dep) = self.edges[node].get(next) else {
                    colors[node] = Color::Black;
                    order.push(node);
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                match colors[dep] {
                    Color::White => {
                        colors[dep] = Color::Gray;
                        stack.push((dep, 0));
                    }
                    Color::Gray => {
                        if let Some(start) = stack.iter().position(|&(n, _)| n == dep) {
                            cycles.push(stack[start..].iter().map(|&(n, _)| n).collect());
                        }
                    }
                    Color::Black => {}
                }
            }
        }

        (order, cycles)
    }
}
