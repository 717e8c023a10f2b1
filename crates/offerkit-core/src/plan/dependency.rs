//! Dependency graph between sibling plan elements.
//!
//! Edges point from an element to the elements it waits for.

use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `element` waits for `depends_on`.
    pub fn add_dependency(&mut self, element: impl Into<String>, depends_on: impl Into<String>) {
        self.edges
            .entry(element.into())
            .or_default()
            .insert(depends_on.into());
    }

    pub fn get_dependencies(&self, element: &str) -> Vec<&str> {
        self.edges
            .get(element)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// First cycle found, as the path `a -> ... -> a`; None for a DAG.
    ///
    /// Gray/black DFS, O(V + E).
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut colors: HashMap<&str, Color> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        for start in self.edges.keys() {
            if !colors.contains_key(start.as_str()) {
                if let Some(cycle) = self.dfs_cycle(start, &mut colors, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        colors: &mut HashMap<&'a str, Color>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        colors.insert(node, Color::Gray);
        path.push(node);
        for dep in self.edges.get(node).into_iter().flatten() {
            match colors.get(dep.as_str()) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|n| *n == dep.as_str())?;
                    let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    if let Some(cycle) = self.dfs_cycle(dep, colors, path) {
                        return Some(cycle);
                    }
                }
            }
        }
        colors.insert(node, Color::Black);
        path.pop();
        None
    }
}
