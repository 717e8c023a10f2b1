//! Strategies: which children of an element may be worked on now.
//!
//! A strategy is a pure function of the children's names, statuses and
//! whether another plan is already working on their pod instance ("dirty").

use std::collections::BTreeMap;

use crate::domain::Status;

use super::PlanError;
use super::dependency::DependencyGraph;

/// One child as seen by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildState<'a> {
    pub name: &'a str,
    pub status: Status,
    /// Another plan owns the child's pod instance this pass.
    pub dirty: bool,
}

impl<'a> ChildState<'a> {
    pub fn new(name: &'a str, status: Status) -> Self {
        Self {
            name,
            status,
            dirty: false,
        }
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    /// One child at a time, in declared order.
    Serial,
    /// Every child not yet complete.
    Parallel,
    /// Children whose prerequisites are all complete.
    Dependency(DependencyStrategy),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Serial => "serial",
            Strategy::Parallel => "parallel",
            Strategy::Dependency(_) => "dependency",
        }
    }

    /// Indices into `children` of the candidates, in declared order.
    ///
    /// # Invariants
    /// - Serial returns at most one index
    /// - complete and dirty children are never returned
    /// - Serial does not skip ahead past a dirty child
    pub fn candidates(&self, children: &[ChildState<'_>]) -> Vec<usize> {
        let open = |c: &ChildState<'_>| !c.status.is_complete() && !c.dirty;
        match self {
            Strategy::Serial => children
                .iter()
                .position(|c| !c.status.is_complete())
                .filter(|&i| open(&children[i]))
                .into_iter()
                .collect(),
            Strategy::Parallel => children
                .iter()
                .enumerate()
                .filter(|(_, c)| open(c))
                .map(|(i, _)| i)
                .collect(),
            Strategy::Dependency(deps) => {
                let complete = |name: &str| {
                    children
                        .iter()
                        .any(|c| c.name == name && c.status.is_complete())
                };
                children
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| open(c))
                    .filter(|(_, c)| {
                        deps.graph
                            .get_dependencies(c.name)
                            .into_iter()
                            .all(complete)
                    })
                    .map(|(i, _)| i)
                    .collect()
            }
        }
    }
}

/// Validated dependency map: child -> prerequisite children.
#[derive(Debug, Clone)]
pub struct DependencyStrategy {
    graph: DependencyGraph,
}

impl DependencyStrategy {
    /// Fails on a name that is not one of `children`, or on a cycle.
    pub fn new<S: AsRef<str>>(
        children: &[S],
        dependencies: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, PlanError> {
        let known = |name: &str| children.iter().any(|c| c.as_ref() == name);
        let mut graph = DependencyGraph::new();
        for (element, prerequisites) in dependencies {
            if !known(element) {
                return Err(PlanError::UnknownElement(element.clone()));
            }
            for dependency in prerequisites {
                if !known(dependency) {
                    return Err(PlanError::UnknownDependency {
                        element: element.clone(),
                        dependency: dependency.clone(),
                    });
                }
                graph.add_dependency(element.as_str(), dependency.as_str());
            }
        }
        if let Some(cycle) = graph.detect_cycle() {
            return Err(PlanError::CyclicDependency(cycle));
        }
        Ok(Self { graph })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn children<'a>(statuses: &[(&'a str, Status)]) -> Vec<ChildState<'a>> {
        statuses.iter().map(|&(n, s)| ChildState::new(n, s)).collect()
    }

    fn deps(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[rstest]
    #[case::all_pending(&[Status::Pending, Status::Pending, Status::Pending], vec![0])]
    #[case::first_done(&[Status::Complete, Status::Pending, Status::Pending], vec![1])]
    #[case::first_running(&[Status::InProgress, Status::Pending, Status::Pending], vec![0])]
    #[case::error_blocks(&[Status::Complete, Status::Error, Status::Pending], vec![1])]
    #[case::all_done(&[Status::Complete, Status::Complete, Status::Complete], vec![])]
    fn serial_returns_at_most_one(#[case] statuses: &[Status], #[case] expected: Vec<usize>) {
        let names = ["a", "b", "c"];
        let kids: Vec<_> = names
            .iter()
            .zip(statuses)
            .map(|(n, s)| ChildState::new(n, *s))
            .collect();
        let got = Strategy::Serial.candidates(&kids);
        assert!(got.len() <= 1);
        assert_eq!(got, expected);
    }

    #[test]
    fn serial_waits_on_a_dirty_child() {
        let kids = vec![
            ChildState::new("a", Status::Pending).dirty(),
            ChildState::new("b", Status::Pending),
        ];
        assert!(Strategy::Serial.candidates(&kids).is_empty());
    }

    #[test]
    fn parallel_returns_every_open_child() {
        let mut kids = children(&[
            ("a", Status::Complete),
            ("b", Status::Pending),
            ("c", Status::Error),
            ("d", Status::InProgress),
        ]);
        assert_eq!(Strategy::Parallel.candidates(&kids), vec![1, 2, 3]);

        kids[1] = kids[1].dirty();
        assert_eq!(Strategy::Parallel.candidates(&kids), vec![2, 3]);
    }

    #[test]
    fn dependency_waits_for_every_prerequisite() {
        let names = ["a", "b", "c"];
        let strategy = Strategy::Dependency(
            DependencyStrategy::new(&names, &deps(&[("c", &["a", "b"])])).unwrap(),
        );

        let kids = children(&[("a", Status::Complete), ("b", Status::InProgress), ("c", Status::Pending)]);
        assert_eq!(strategy.candidates(&kids), vec![1]);

        let kids = children(&[("a", Status::Complete), ("b", Status::Complete), ("c", Status::Pending)]);
        assert_eq!(strategy.candidates(&kids), vec![2]);
    }

    #[test]
    fn dependency_rejects_cycles_at_construction() {
        let names = ["a", "b", "c"];
        let err = DependencyStrategy::new(&names, &deps(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"])]))
            .unwrap_err();
        assert!(matches!(err, PlanError::CyclicDependency(ref cycle) if cycle.len() == 4));
    }

    #[rstest]
    #[case::unknown_child(&[("x", &["a"] as &[&str])])]
    #[case::unknown_prerequisite(&[("a", &["x"] as &[&str])])]
    fn dependency_rejects_unknown_names(#[case] pairs: &[(&str, &[&str])]) {
        assert!(DependencyStrategy::new(&["a", "b"], &deps(pairs)).is_err());
    }
}
