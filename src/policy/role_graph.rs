//! Role subsumption graph

use crate::config::RoleDefinition;
use crate::error::{AppError, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone)]
struct RoleNode {
    description: String,
    subsumes: Vec<String>,
}

/// Immutable directed acyclic graph of role subsumption
#[derive(Debug, Clone)]
pub struct RoleGraph {
    nodes: BTreeMap<String, RoleNode>,
    /// Declaration order
    order: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl RoleGraph {
    /// Build the graph, rejecting duplicate names, dangling edges and cycles
    pub fn from_definitions(definitions: &[RoleDefinition]) -> Result<Self> {
        if definitions.is_empty() {
            return Err(AppError::Configuration(
                "Role catalog defines no roles".to_string(),
            ));
        }

        let mut nodes = BTreeMap::new();
        let mut order = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if definition.name.trim().is_empty() {
                return Err(AppError::Configuration(
                    "Role name must not be empty".to_string(),
                ));
            }
            let node = RoleNode {
                description: definition.description.clone(),
                subsumes: definition.subsumes.clone(),
            };
            if nodes.insert(definition.name.clone(), node).is_some() {
                return Err(AppError::Configuration(format!(
                    "Role '{}' is defined more than once",
                    definition.name
                )));
            }
            order.push(definition.name.clone());
        }

        for (name, node) in &nodes {
            if let Some(missing) = node.subsumes.iter().find(|r| !nodes.contains_key(*r)) {
                return Err(AppError::Configuration(format!(
                    "Role '{}' subsumes unknown role '{}'",
                    name, missing
                )));
            }
        }

        let graph = Self { nodes, order };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
        for root in &self.order {
            let mut path = Vec::new();
            self.visit(root, &mut marks, &mut path)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        role: &'a str,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<()> {
        match marks.get(role) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|r| *r == role).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(role);
                return Err(AppError::Configuration(format!(
                    "Role hierarchy contains a cycle: {}",
                    cycle.join(" -> ")
                )));
            }
            None => {}
        }

        marks.insert(role, Mark::Visiting);
        path.push(role);
        if let Some(node) = self.nodes.get(role) {
            for child in &node.subsumes {
                self.visit(child, marks, path)?;
            }
        }
        path.pop();
        marks.insert(role, Mark::Done);
        Ok(())
    }

    /// The role itself plus every role it transitively subsumes
    pub fn expand(&self, role: &str) -> Result<BTreeSet<String>> {
        if !self.nodes.contains_key(role) {
            return Err(AppError::UnknownRole(role.to_string()));
        }

        let mut expanded = BTreeSet::new();
        let mut queue = VecDeque::from([role]);
        while let Some(current) = queue.pop_front() {
            if !expanded.insert(current.to_string()) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                queue.extend(node.subsumes.iter().map(String::as_str));
            }
        }
        Ok(expanded)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.nodes.contains_key(role)
    }

    /// Role names in declaration order
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn description(&self, role: &str) -> Option<&str> {
        self.nodes.get(role).map(|n| n.description.as_str())
    }

    /// Role whose expansion is the largest; the first declared wins a tie
    pub fn top_role(&self) -> &str {
        let mut best: Option<(&str, usize)> = None;
        for role in self.roles() {
            let size = self.expand(role).map(|e| e.len()).unwrap_or_default();
            if best.map_or(true, |(_, best_size)| size > best_size) {
                best = Some((role, size));
            }
        }
        best.map(|(role, _)| role).unwrap_or_default()
    }
}
