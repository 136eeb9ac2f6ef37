//! Flat employee list to reporting tree.
//!
//! Nodes are attached to their manager by input position, so the builder
//! never walks manager ids and cannot loop on a cyclic reporting chain.
//! Records whose manager is missing from the input are dropped along with
//! their subtree.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::record::EmployeeRecord;

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgNode {
    #[serde(flatten)]
    pub record: EmployeeRecord,
    pub children: Vec<OrgNode>,
}

impl OrgNode {
    pub fn employee_id(&self) -> &str {
        &self.record.employee_id
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        self.pre_order().count()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn find(&self, employee_id: &str) -> Option<&OrgNode> {
        self.pre_order().find(|node| node.employee_id() == employee_id)
    }

    /// Employee ids in pre-order.
    pub fn ids(&self) -> Vec<&str> {
        self.pre_order().map(OrgNode::employee_id).collect()
    }

    /// Walks the subtree with an explicit stack; reporting chains can be
    /// deeper than the call stack allows.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

impl Drop for OrgNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a OrgNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a OrgNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Builds the org tree and returns the first record without a manager as its
/// root. When several records have no manager the rest are not part of the
/// result; use [`build_org_forest`] to see all of them.
pub fn build_org_tree(records: &[EmployeeRecord]) -> Option<OrgNode> {
    build_org_forest(records).into_iter().next()
}

/// Builds one tree per record without a manager, in input order.
pub fn build_org_forest(records: &[EmployeeRecord]) -> Vec<OrgNode> {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        // first occurrence wins on duplicate ids
        slots.entry(record.employee_id.as_str()).or_insert(idx);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        if slots.get(record.employee_id.as_str()) != Some(&idx) {
            continue;
        }
        let manager = record
            .manager_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match manager {
            None => roots.push(idx),
            Some(manager) => {
                if let Some(&parent) = slots.get(manager) {
                    if parent != idx {
                        children[parent].push(idx);
                    }
                }
            }
        }
    }

    roots
        .into_iter()
        .map(|idx| assemble(records, &children, idx))
        .collect()
}

/// Builds the subtree under `root` bottom-up. Each index has at most one
/// parent, so every node is visited once.
fn assemble(records: &[EmployeeRecord], children: &[Vec<usize>], root: usize) -> OrgNode {
    let mut stack = vec![(root, false)];
    let mut built: Vec<OrgNode> = Vec::new();
    while let Some((idx, ready)) = stack.pop() {
        if ready {
            let kids = built.split_off(built.len() - children[idx].len());
            built.push(OrgNode {
                record: records[idx].clone(),
                children: kids,
            });
        } else {
            stack.push((idx, true));
            stack.extend(children[idx].iter().rev().map(|&child| (child, false)));
        }
    }
    // the root is the last node finished
    built.pop().unwrap_or_else(|| OrgNode {
        record: records[root].clone(),
        children: Vec::new(),
    })
}

/// Which subtrees a view renders. Kept apart from the tree so a rebuilt tree
/// keeps the viewer's expansion state.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ExpandedKeys {
    keys: HashSet<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct VisibleNode<'a> {
    pub depth: usize,
    pub node: &'a OrgNode,
}

impl ExpandedKeys {
    /// Only the root starts expanded.
    pub fn for_root(root: &OrgNode) -> Self {
        let mut keys = HashSet::new();
        keys.insert(root.employee_id().to_string());
        Self { keys }
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Flips the expansion of `employee_id` and returns the new state.
    pub fn toggle(&mut self, employee_id: &str) -> bool {
        if self.keys.remove(employee_id) {
            false
        } else {
            self.keys.insert(employee_id.to_string());
            true
        }
    }

    pub fn is_expanded(&self, employee_id: &str) -> bool {
        self.keys.contains(employee_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Nodes a view renders: the root, then the children of every expanded
    /// node, in pre-order.
    pub fn visible<'a>(&self, root: &'a OrgNode) -> Vec<VisibleNode<'a>> {
        let mut out = Vec::new();
        let mut stack = vec![(0, root)];
        while let Some((depth, node)) = stack.pop() {
            out.push(VisibleNode { depth, node });
            if self.is_expanded(node.employee_id()) {
                stack.extend(node.children.iter().rev().map(|child| (depth + 1, child)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Role;
    use pretty_assertions::assert_eq;

    fn emp(id: &str, manager: Option<&str>) -> EmployeeRecord {
        let record = EmployeeRecord::new(id, Role::Employee, id, "Test");
        match manager {
            Some(manager) => record.reporting_to(manager),
            None => record,
        }
    }

    fn children_of<'a>(node: &'a OrgNode) -> Vec<&'a str> {
        node.children.iter().map(OrgNode::employee_id).collect()
    }

    #[test]
    fn empty_input_has_no_tree() {
        assert_eq!(build_org_tree(&[]), None);
        assert!(build_org_forest(&[]).is_empty());
    }

    #[test]
    fn every_resolving_record_appears_once() {
        let records = vec![
            emp("c2", Some("b1")),
            emp("b1", Some("a")),
            emp("a", None),
            emp("b2", Some("a")),
            emp("c1", Some("b1")),
            emp("d1", Some("c1")),
        ];
        let root = build_org_tree(&records).unwrap();
        assert_eq!(root.employee_id(), "a");
        assert_eq!(root.len(), records.len());

        let mut ids = root.ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b1", "b2", "c1", "c2", "d1"]);

        for record in &records {
            let node = root.find(&record.employee_id).unwrap();
            let expected: Vec<&str> = records
                .iter()
                .filter(|r| r.manager_id.as_deref() == Some(record.employee_id.as_str()))
                .map(|r| r.employee_id.as_str())
                .collect();
            assert_eq!(children_of(node), expected);
        }
    }

    #[test]
    fn children_follow_input_order() {
        let records = vec![
            emp("root", None),
            emp("z", Some("root")),
            emp("m", Some("root")),
            emp("a", Some("root")),
        ];
        let root = build_org_tree(&records).unwrap();
        assert_eq!(children_of(&root), vec!["z", "m", "a"]);
    }

    #[test]
    fn dangling_manager_drops_the_subtree() {
        let records = vec![
            emp("a", None),
            emp("b", Some("a")),
            emp("ghost-child", Some("ghost")),
            emp("grandchild", Some("ghost-child")),
        ];
        let root = build_org_tree(&records).unwrap();
        assert_eq!(root.len(), 2);
        assert!(root.find("ghost-child").is_none());
        assert!(root.find("grandchild").is_none());
    }

    #[test]
    fn multiple_roots_return_one_of_them() {
        let records = vec![emp("x", None), emp("y", None), emp("x1", Some("x"))];
        let root = build_org_tree(&records).unwrap();
        assert!(["x", "y"].contains(&root.employee_id()));

        let forest = build_org_forest(&records);
        let roots: Vec<&str> = forest.iter().map(OrgNode::employee_id).collect();
        assert_eq!(roots, vec!["x", "y"]);
    }

    #[test]
    fn building_twice_is_identical() {
        let records = vec![
            emp("a", None),
            emp("b", Some("a")),
            emp("c", Some("b")),
            emp("d", Some("a")),
        ];
        assert_eq!(build_org_tree(&records), build_org_tree(&records));
    }

    #[test]
    fn cycles_terminate_and_stay_out_of_the_tree() {
        let records = vec![
            emp("root", None),
            emp("a", Some("b")),
            emp("b", Some("a")),
            emp("self", Some("self")),
            emp("c", Some("root")),
        ];
        let root = build_org_tree(&records).unwrap();
        assert_eq!(root.ids(), vec!["root", "c"]);
    }

    #[test]
    fn blank_manager_is_a_root() {
        let mut record = emp("solo", None);
        record.manager_id = Some(String::new());
        let root = build_org_tree(&[record]).unwrap();
        assert_eq!(root.employee_id(), "solo");
    }

    #[test]
    fn only_the_root_starts_expanded() {
        let records = vec![
            emp("a", None),
            emp("b", Some("a")),
            emp("c", Some("b")),
            emp("d", Some("a")),
        ];
        let root = build_org_tree(&records).unwrap();
        let mut expanded = ExpandedKeys::for_root(&root);
        assert!(expanded.is_expanded("a"));
        assert_eq!(expanded.len(), 1);

        let visible: Vec<&str> = expanded
            .visible(&root)
            .iter()
            .map(|v| v.node.employee_id())
            .collect();
        assert_eq!(visible, vec!["a", "b", "d"]);

        assert!(expanded.toggle("b"));
        let visible: Vec<(usize, &str)> = expanded
            .visible(&root)
            .iter()
            .map(|v| (v.depth, v.node.employee_id()))
            .collect();
        assert_eq!(visible, vec![(0, "a"), (1, "b"), (2, "c"), (1, "d")]);

        assert!(!expanded.toggle("a"));
        assert_eq!(expanded.visible(&root).len(), 1);
    }

    #[test]
    fn duplicate_ids_attach_only_the_first_occurrence() {
        let records = vec![emp("A", None), emp("B", Some("A")), emp("A", Some("B"))];
        let root = build_org_tree(&records).unwrap();
        assert_eq!(root.ids(), vec!["A", "B"]);
        assert_eq!(build_org_forest(&records).len(), 1);

        let records = vec![emp("A", Some("B")), emp("B", None), emp("A", None)];
        let forest = build_org_forest(&records);
        let roots: Vec<&str> = forest.iter().map(OrgNode::employee_id).collect();
        assert_eq!(roots, vec!["B"]);
        assert_eq!(forest[0].ids(), vec!["B", "A"]);
    }

    #[test]
    fn deep_reporting_chain_builds_and_walks_without_recursion() {
        const DEPTH: usize = 50_000;
        let mut records = vec![emp("e0", None)];
        for n in 1..DEPTH {
            records.push(emp(&format!("e{n}"), Some(&format!("e{}", n - 1))));
        }

        let root = build_org_tree(&records).unwrap();
        assert_eq!(root.len(), DEPTH);
        let ids = root.ids();
        assert_eq!(ids.first(), Some(&"e0"));
        assert_eq!(ids.last(), Some(&"e49999"));
        assert!(root.find("e49999").unwrap().is_leaf());

        let everything = ExpandedKeys::from_ids(records.iter().map(|r| r.employee_id.clone()));
        let visible = everything.visible(&root);
        assert_eq!(visible.len(), DEPTH);
        assert_eq!(visible[DEPTH - 1].depth, DEPTH - 1);

    }
}
