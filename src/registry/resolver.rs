//! Dependency ordering for table loads
//!
//! Tables that are referenced by other tables must be populated first. The
//! resolver builds a directed graph (dependent -> dependency) and walks it
//! depth first, emitting each table after all of its dependencies. Tables
//! with no relationship between them keep their declaration order, so the
//! same registry always yields the same order.

use petgraph::graph::NodeIndex;
use petgraph::{Directed, Direction, Graph};
use std::collections::{HashMap, HashSet};

use super::TableSpec;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    Visiting,
    Visited,
}

/// Orders tables so that every dependency precedes its dependents
pub struct DependencyResolver<'a> {
    tables: &'a [TableSpec],
}

impl<'a> DependencyResolver<'a> {
    /// Create a resolver over a set of table specs
    ///
    /// # Example
    ///
    /// ```rust
    /// use registry_codes::registry::{ColumnDef, ColumnType, DependencyResolver, TableSpec};
    ///
    /// let column = || vec![ColumnDef::new("code", ColumnType::Text)];
    /// let tables = vec![
    ///     TableSpec::new("facility", column()).with_dependencies(["code_list"]),
    ///     TableSpec::new("code_list", column()),
    /// ];
    ///
    /// let order = DependencyResolver::new(&tables).resolve().unwrap();
    /// assert_eq!(order, vec!["code_list", "facility"]);
    /// ```
    pub fn new(tables: &'a [TableSpec]) -> Self {
        Self { tables }
    }

    /// Resolve a load order over every table
    ///
    /// # Errors
    /// A dependency on an undeclared table is a configuration error. A cycle
    /// is reported with the exact path of tables that form it.
    pub fn resolve(&self) -> PipelineResult<Vec<String>> {
        let graph = self.build_graph()?;
        let mut state = vec![VisitState::Unvisited; graph.node_count()];
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(graph.node_count());

        for node in graph.node_indices() {
            Self::visit(&graph, node, &mut state, &mut path, &mut order)?;
        }

        Ok(order)
    }

    /// Order a selection of tables consistently with the full order
    ///
    /// Dependencies are not pulled into the selection automatically. A
    /// selected table whose dependency is not selected is loaded against
    /// whatever the dependency table already holds, which is logged.
    pub fn order_subset(&self, names: &[String]) -> PipelineResult<Vec<String>> {
        for name in names {
            if !self.tables.iter().any(|t| &t.name == name) {
                return Err(PipelineError::Config(format!("Unknown table: {}", name)));
            }
        }

        let selected: HashSet<&str> = names.iter().map(String::as_str).collect();
        let order: Vec<String> = self
            .resolve()?
            .into_iter()
            .filter(|name| selected.contains(name.as_str()))
            .collect();

        for table in self.tables.iter().filter(|t| selected.contains(t.name.as_str())) {
            for dependency in &table.dependencies {
                if !selected.contains(dependency.as_str()) {
                    tracing::warn!(
                        "{} depends on {} which is not selected for this run",
                        table.name,
                        dependency
                    );
                }
            }
        }

        Ok(order)
    }

    fn build_graph(&self) -> PipelineResult<Graph<&'a str, (), Directed>> {
        let mut graph = Graph::<&'a str, (), Directed>::new();
        let mut node_map: HashMap<&'a str, NodeIndex> = HashMap::new();

        for table in self.tables {
            let node = graph.add_node(table.name.as_str());
            node_map.insert(table.name.as_str(), node);
        }

        for table in self.tables {
            let from = node_map[table.name.as_str()];
            for dependency in &table.dependencies {
                let to = node_map.get(dependency.as_str()).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "Table {} depends on unknown table {}",
                        table.name, dependency
                    ))
                })?;
                graph.add_edge(from, *to, ());
            }
        }

        Ok(graph)
    }

    fn visit(
        graph: &Graph<&'a str, (), Directed>,
        node: NodeIndex,
        state: &mut [VisitState],
        path: &mut Vec<NodeIndex>,
        order: &mut Vec<String>,
    ) -> PipelineResult<()> {
        match state[node.index()] {
            VisitState::Visited => return Ok(()),
            VisitState::Visiting => {
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|n| graph[*n].to_string()).collect();
                cycle.push(graph[node].to_string());
                return Err(PipelineError::CyclicDependency { path: cycle });
            }
            VisitState::Unvisited => {}
        }

        state[node.index()] = VisitState::Visiting;
        path.push(node);

        // petgraph yields the most recently added edge first
        let mut dependencies: Vec<NodeIndex> =
            graph.neighbors_directed(node, Direction::Outgoing).collect();
        dependencies.reverse();
        for dependency in dependencies {
            Self::visit(graph, dependency, state, path, order)?;
        }

        path.pop();
        state[node.index()] = VisitState::Visited;
        order.push(graph[node].to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ColumnDef, ColumnType};

    fn table(name: &str, deps: &[&str]) -> TableSpec {
        TableSpec::new(name, vec![ColumnDef::new("id", ColumnType::Text)])
            .with_dependencies(deps.iter().copied())
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_declaration_order_kept_without_dependencies() {
        let tables = vec![table("c", &[]), table("a", &[]), table("b", &[])];
        let order = DependencyResolver::new(&tables).resolve().unwrap();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dependency_moves_before_dependent() {
        let tables = vec![table("a", &[]), table("b", &["c"]), table("c", &[])];
        let order = DependencyResolver::new(&tables).resolve().unwrap();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_diamond() {
        let tables = vec![
            table("top", &["left", "right"]),
            table("left", &["base"]),
            table("right", &["base"]),
            table("base", &[]),
        ];
        let order = DependencyResolver::new(&tables).resolve().unwrap();
        assert_eq!(order, vec!["base", "left", "right", "top"]);
        for spec in &tables {
            for dep in &spec.dependencies {
                assert!(position(&order, dep) < position(&order, &spec.name));
            }
        }
    }

    #[test]
    fn test_cycle_reports_path() {
        let tables = vec![table("a", &["b"]), table("b", &["c"]), table("c", &["a"])];
        let err = DependencyResolver::new(&tables).resolve().unwrap_err();
        match err {
            PipelineError::CyclicDependency { path } => {
                assert_eq!(path, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let tables = vec![table("a", &["a"])];
        let err = DependencyResolver::new(&tables).resolve().unwrap_err();
        assert!(matches!(err, PipelineError::CyclicDependency { ref path } if path == &["a", "a"]));
    }

    #[test]
    fn test_unknown_dependency() {
        let tables = vec![table("a", &["missing"])];
        let err = DependencyResolver::new(&tables).resolve().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_order_subset() {
        let tables = vec![table("b", &["a"]), table("a", &[]), table("c", &[])];
        let resolver = DependencyResolver::new(&tables);
        let order = resolver
            .order_subset(&["c".to_string(), "b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);

        let only_b = resolver.order_subset(&["b".to_string()]).unwrap();
        assert_eq!(only_b, vec!["b"]);

        assert!(resolver.order_subset(&["zzz".to_string()]).is_err());
    }
}
