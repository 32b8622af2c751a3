//! Startup ordering using `petgraph`.
//!
//! Builds a directed graph whose edges point from a dependency to its
//! dependent, then linearizes it with Kahn's algorithm. Ties between ready
//! services are always broken by catalog index, so a set without any
//! dependency comes out in catalog order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, VecDeque};

use homelab_common::error::{HomelabError, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::overrides::ResolvedService;

/// Declared dependencies: service name to the names it must start after.
pub type DependencyHints = BTreeMap<String, BTreeSet<String>>;

/// One service's position in the startup plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedService {
    /// Position of the service in the resolved set.
    pub catalog_index: usize,
    /// Service name.
    pub name: String,
    /// Longest chain of dependencies below this service; services in the same
    /// tier have no ordering constraint between them.
    pub tier: usize,
    /// Direct dependencies, in catalog order.
    pub start_after: Vec<String>,
}

/// A cycle-free startup order over resolved services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyPlan {
    /// Services in startup order.
    pub services: Vec<PlannedService>,
}

impl DependencyPlan {
    /// Service names in startup order.
    #[must_use]
    pub fn order(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Services grouped by tier, each group in startup order.
    #[must_use]
    pub fn tiers(&self) -> Vec<Vec<&str>> {
        let mut tiers: Vec<Vec<&str>> = Vec::new();
        for svc in &self.services {
            if tiers.len() <= svc.tier {
                tiers.resize_with(svc.tier + 1, Vec::new);
            }
            tiers[svc.tier].push(svc.name.as_str());
        }
        tiers
    }
}

/// Hint targets that do not name any service in the set, as `(dependent, target)`.
#[must_use]
pub fn unknown_hint_targets<'a>(
    services: &[ResolvedService],
    hints: &'a DependencyHints,
) -> Vec<(&'a str, &'a str)> {
    hints
        .iter()
        .flat_map(|(dependent, targets)| {
            targets
                .iter()
                .map(move |target| (dependent.as_str(), target.as_str()))
        })
        .filter(|(_, target)| !services.iter().any(|s| s.name == *target))
        .collect()
}

/// Hint keys that do not name any service in the set; their hints are never applied.
#[must_use]
pub fn unknown_hint_dependents<'a>(
    services: &[ResolvedService],
    hints: &'a DependencyHints,
) -> Vec<&'a str> {
    hints
        .keys()
        .map(String::as_str)
        .filter(|dependent| !services.iter().any(|s| s.name == *dependent))
        .collect()
}

/// Computes the startup plan.
///
/// Edges come from `hints` and from `container:<ref>` network modes. Edges
/// naming a service outside the set are skipped.
///
/// # Errors
///
/// Returns [`HomelabError::DependencyCycle`] naming the shortest cycle when
/// no valid order exists.
pub fn plan(services: &[ResolvedService], hints: &DependencyHints) -> Result<DependencyPlan> {
    tracing::info!(
        services = services.len(),
        hinted = hints.len(),
        "planning startup order"
    );

    let graph = build_graph(services, hints);
    let count = graph.node_count();

    let mut in_degree: Vec<usize> = (0..count)
        .map(|i| {
            graph
                .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                .count()
        })
        .collect();
    let mut tier = vec![0usize; count];
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut ordered = Vec::with_capacity(count);
    while let Some(Reverse(current)) = ready.pop() {
        ordered.push(current);
        for dependent in graph.neighbors_directed(NodeIndex::new(current), Direction::Outgoing) {
            let d = dependent.index();
            tier[d] = tier[d].max(tier[current] + 1);
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }

    if ordered.len() < count {
        let cycle = shortest_cycle(&graph, &in_degree)
            .into_iter()
            .map(|i| services[i].name.clone())
            .collect::<Vec<_>>();
        tracing::warn!(cycle = ?cycle, "dependency cycle detected");
        return Err(HomelabError::DependencyCycle { cycle });
    }

    let services = ordered
        .into_iter()
        .map(|i| {
            let mut deps: Vec<usize> = graph
                .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                .map(NodeIndex::index)
                .collect();
            deps.sort_unstable();
            PlannedService {
                catalog_index: services[i].catalog_index,
                name: services[i].name.clone(),
                tier: tier[i],
                start_after: deps.into_iter().map(|d| services[d].name.clone()).collect(),
            }
        })
        .collect();

    Ok(DependencyPlan { services })
}

/// Node `i` of the returned graph is `services[i]`.
fn build_graph(services: &[ResolvedService], hints: &DependencyHints) -> DiGraph<(), ()> {
    let mut graph = DiGraph::with_capacity(services.len(), hints.len());
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
    for svc in services {
        let node = graph.add_node(());
        let _ = index_of.entry(svc.name.as_str()).or_insert(node);
    }

    for (i, svc) in services.iter().enumerate() {
        let dependent = NodeIndex::new(i);
        let declared = hints
            .get(&svc.name)
            .into_iter()
            .flatten()
            .map(String::as_str);
        let inferred = svc.network_mode.container_ref();

        for target in declared.chain(inferred) {
            match index_of.get(target) {
                Some(&dependency) => {
                    let _ = graph.update_edge(dependency, dependent, ());
                }
                None => {
                    tracing::debug!(service = %svc.name, dependency = target, "skipping unknown dependency");
                }
            }
        }
    }

    graph
}

/// Finds the shortest cycle among nodes Kahn's algorithm could not emit,
/// rotated to begin at its lowest index and closed by repeating that node.
fn shortest_cycle(graph: &DiGraph<(), ()>, in_degree: &[usize]) -> Vec<usize> {
    let stuck: Vec<bool> = in_degree.iter().map(|d| *d > 0).collect();
    let mut best: Option<Vec<usize>> = None;

    for start in (0..stuck.len()).filter(|i| stuck[*i]) {
        let Some(path) = path_back_to(graph, &stuck, start) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| path.len() < b.len()) {
            best = Some(path);
        }
    }

    let mut cycle = best.unwrap_or_default();
    if let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| **node)
        .map(|(pos, _)| pos)
    {
        cycle.rotate_left(min_pos);
        cycle.push(cycle[0]);
    }
    cycle
}

/// Breadth-first search for the shortest path from `start` back to itself.
fn path_back_to(graph: &DiGraph<(), ()>, stuck: &[bool], start: usize) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; stuck.len()];
    let mut queue = VecDeque::from([start]);
    let mut seen = vec![false; stuck.len()];

    while let Some(current) = queue.pop_front() {
        let mut next: Vec<usize> = graph
            .neighbors_directed(NodeIndex::new(current), Direction::Outgoing)
            .map(NodeIndex::index)
            .filter(|n| stuck[*n])
            .collect();
        next.sort_unstable();

        for n in next {
            if n == start {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(p) = parent[cursor] {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return Some(path);
            }
            if !seen[n] {
                seen[n] = true;
                parent[n] = Some(current);
                queue.push_back(n);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use homelab_common::types::{NetworkMode, RestartPolicy};

    use super::*;

    fn services(names: &[&str]) -> Vec<ResolvedService> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ResolvedService {
                catalog_index: i,
                name: (*name).into(),
                image: format!("example/{name}"),
                default_port: None,
                volumes: Vec::new(),
                environment: BTreeMap::new(),
                network_mode: NetworkMode::Bridge,
                ports: Vec::new(),
                restart_policy: RestartPolicy::No,
            })
            .collect()
    }

    fn hints(pairs: &[(&str, &str)]) -> DependencyHints {
        let mut hints = DependencyHints::new();
        for (dependent, dependency) in pairs {
            let _ = hints
                .entry((*dependent).into())
                .or_default()
                .insert((*dependency).into());
        }
        hints
    }

    #[test]
    fn empty_set_plans_to_empty() {
        let plan = plan(&[], &DependencyHints::new()).expect("should plan");
        assert!(plan.services.is_empty());
        assert!(plan.tiers().is_empty());
    }

    #[test]
    fn no_dependencies_keeps_catalog_order() {
        let set = services(&["sonarr", "radarr", "lidarr", "prowlarr"]);
        let plan = plan(&set, &DependencyHints::new()).expect("should plan");
        assert_eq!(plan.order(), vec!["sonarr", "radarr", "lidarr", "prowlarr"]);
        assert_eq!(plan.tiers().len(), 1);
    }

    #[test]
    fn dependency_precedes_dependent() {
        let set = services(&["nginx-proxy-manager", "gitea", "bookstack"]);
        let plan = plan(
            &set,
            &hints(&[("nginx-proxy-manager", "gitea"), ("nginx-proxy-manager", "bookstack")]),
        )
        .expect("should plan");
        assert_eq!(plan.order(), vec!["gitea", "bookstack", "nginx-proxy-manager"]);
        assert_eq!(plan.services[2].start_after, vec!["gitea", "bookstack"]);
        assert_eq!(plan.tiers(), vec![vec!["gitea", "bookstack"], vec!["nginx-proxy-manager"]]);
    }

    #[test]
    fn ties_break_by_catalog_index() {
        let set = services(&["a", "b", "c", "d"]);
        let plan = plan(&set, &hints(&[("a", "d")])).expect("should plan");
        assert_eq!(plan.order(), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn diamond_dependency() {
        let set = services(&["a", "b", "c", "d"]);
        let plan = plan(
            &set,
            &hints(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]),
        )
        .expect("should plan");
        assert_eq!(plan.order(), vec!["d", "b", "c", "a"]);
        let tier_of = |name: &str| {
            plan.services
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.tier)
                .expect(name)
        };
        assert_eq!(tier_of("d"), 0);
        assert_eq!(tier_of("b"), 1);
        assert_eq!(tier_of("a"), 2);
    }

    #[test]
    fn container_network_mode_infers_dependency() {
        let mut set = services(&["qbittorrent", "gluetun"]);
        set[0].network_mode = NetworkMode::Container("gluetun".into());
        let plan = plan(&set, &DependencyHints::new()).expect("should plan");
        assert_eq!(plan.order(), vec!["gluetun", "qbittorrent"]);
        assert_eq!(plan.services[1].start_after, vec!["gluetun"]);
    }

    #[test]
    fn unknown_hint_targets_are_skipped() {
        let set = services(&["sonarr", "radarr"]);
        let hinted = hints(&[("sonarr", "postgres")]);
        let plan = plan(&set, &hinted).expect("should plan");
        assert_eq!(plan.order(), vec!["sonarr", "radarr"]);
        assert_eq!(unknown_hint_targets(&set, &hinted), vec![("sonarr", "postgres")]);
    }

    #[test]
    fn unknown_hint_dependents_are_listed() {
        let set = services(&["gitea", "caddy"]);
        let hinted = hints(&[("cady", "gitea"), ("caddy", "gitea")]);
        assert_eq!(unknown_hint_dependents(&set, &hinted), vec!["cady"]);
        assert!(unknown_hint_targets(&set, &hinted).is_empty());
    }

    #[test]
    fn two_node_cycle_detection() {
        let set = services(&["a", "b"]);
        let result = plan(&set, &hints(&[("a", "b"), ("b", "a")]));
        match result {
            Err(HomelabError::DependencyCycle { cycle }) => {
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn reports_shortest_cycle() {
        let set = services(&["a", "b", "c", "d", "e"]);
        let result = plan(
            &set,
            &hints(&[("b", "c"), ("c", "d"), ("d", "b"), ("e", "d"), ("d", "e"), ("a", "b")]),
        );
        match result {
            Err(HomelabError::DependencyCycle { cycle }) => {
                assert_eq!(cycle, vec!["d", "e", "d"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let set = services(&["a"]);
        let result = plan(&set, &hints(&[("a", "a")]));
        match result {
            Err(HomelabError::DependencyCycle { cycle }) => assert_eq!(cycle, vec!["a", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }
}
