/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! An in-memory view of one plane's table pair, for the merger and for
//! diagnostics. Nothing here looks through the views: a Local tree is only
//! what `bookmarksLocal` and `bookmarksLocalStructure` hold.

use crate::error::*;
use crate::types::{BookmarkNodeType, Plane};
use rusqlite::Connection;
use sql_support::ConnExt;
use std::collections::{HashMap, HashSet};
use sync_guid::Guid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkTreeNode {
    Folder { guid: Guid, children: Vec<Guid> },
    NonFolder { guid: Guid },
    /// A structure row names it, but there's no live value row (or the
    /// row has a type we don't know).
    Unknown { guid: Guid },
}

impl BookmarkTreeNode {
    pub fn guid(&self) -> &Guid {
        match self {
            BookmarkTreeNode::Folder { guid, .. }
            | BookmarkTreeNode::NonFolder { guid }
            | BookmarkTreeNode::Unknown { guid } => guid,
        }
    }

    fn for_type(guid: Guid, type_code: i64) -> Self {
        match BookmarkNodeType::from_i64(type_code) {
            Some(t) if t.is_folder() => BookmarkTreeNode::Folder {
                guid,
                children: Vec::new(),
            },
            Some(_) => BookmarkTreeNode::NonFolder { guid },
            None => BookmarkTreeNode::Unknown { guid },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookmarkTree {
    /// Nodes nothing else claims as a child, sorted.
    pub subtrees: Vec<Guid>,
    pub lookup: HashMap<Guid, BookmarkTreeNode>,
    /// Child to parent.
    pub parents: HashMap<Guid, Guid>,
    /// Live non-folders that aren't in any folder.
    pub orphans: HashSet<Guid>,
    /// Tombstones in the value table.
    pub deleted: HashSet<Guid>,
    /// Live rows in the value table.
    pub modified: HashSet<Guid>,
    /// Parents with structure but no live value row.
    pub virtual_parents: HashSet<Guid>,
}

impl BookmarkTree {
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty() && self.deleted.is_empty()
    }

    pub fn node(&self, guid: &Guid) -> Option<&BookmarkTreeNode> {
        self.lookup.get(guid)
    }

    pub fn children_of(&self, guid: &Guid) -> &[Guid] {
        match self.lookup.get(guid) {
            Some(BookmarkTreeNode::Folder { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn parent_of(&self, guid: &Guid) -> Option<&Guid> {
        self.parents.get(guid)
    }

    // Every node has at most one parent, so anything we can't reach from a
    // subtree is on a loop.
    fn check_for_cycles(&self) -> Result<()> {
        let mut seen: HashSet<&Guid> = HashSet::with_capacity(self.lookup.len());
        let mut stack: Vec<&Guid> = self.subtrees.iter().collect();
        while let Some(guid) = stack.pop() {
            if seen.insert(guid) {
                stack.extend(self.children_of(guid));
            }
        }
        match self.lookup.keys().filter(|guid| !seen.contains(guid)).min() {
            Some(guid) => Err(Corruption::Cycle(guid.clone()).into()),
            None => Ok(()),
        }
    }
}

/// Build the tree held in `plane`'s own tables.
pub fn tree_for_plane(db: &Connection, plane: Plane) -> Result<BookmarkTree> {
    let values = plane.value_table();
    let structure = plane.structure_table();
    let mut tree = BookmarkTree::default();

    let statuses: Vec<(Guid, bool)> = db.query_rows_and_then(
        &format!("SELECT guid, is_deleted FROM {}", values),
        [],
        |row| -> rusqlite::Result<_> { Ok((row.get(0)?, row.get(1)?)) },
    )?;
    for (guid, is_deleted) in statuses {
        if is_deleted {
            tree.deleted.insert(guid);
        } else {
            tree.modified.insert(guid);
        }
    }

    let edges: Vec<(Guid, Guid, i64)> = db.query_rows_and_then(
        &format!(
            "SELECT s.parent AS parent, s.child AS child, coalesce(m.type, -1) AS type
             FROM {structure} s
             LEFT JOIN {values} m ON s.child = m.guid AND m.is_deleted IS NOT 1
             ORDER BY s.parent, s.idx ASC",
            structure = structure,
            values = values,
        ),
        [],
        |row| -> rusqlite::Result<_> { Ok((row.get(0)?, row.get(1)?, row.get(2)?)) },
    )?;

    let mut child_lists: HashMap<Guid, Vec<Guid>> = HashMap::new();
    let mut child_nodes: Vec<BookmarkTreeNode> = Vec::with_capacity(edges.len());
    for (parent, child, type_code) in edges {
        let children = child_lists.entry(parent.clone()).or_default();
        if let Some(existing) = tree.parents.get(&child) {
            log::warn!(
                "{} is a child of both {} and {}; keeping the first",
                child,
                existing,
                parent
            );
            continue;
        }
        tree.parents.insert(child.clone(), parent);
        children.push(child.clone());
        child_nodes.push(BookmarkTreeNode::for_type(child, type_code));
    }

    for node in child_nodes {
        tree.lookup.insert(node.guid().clone(), node);
    }
    for (parent, children) in child_lists {
        if !tree.modified.contains(&parent) {
            tree.virtual_parents.insert(parent.clone());
        }
        // A parent's own row may say otherwise, but it has children, so
        // it's a folder.
        tree.lookup.insert(
            parent.clone(),
            BookmarkTreeNode::Folder {
                guid: parent,
                children,
            },
        );
    }

    // Rows the structure query can't see: live non-folders without a
    // parent, and folders without children.
    let remainder: Vec<(Guid, i64)> = db.query_rows_and_then(
        &format!(
            "SELECT m.guid AS guid, m.type AS type
             FROM {values} m LEFT JOIN {structure} s ON s.child = m.guid
             WHERE m.is_deleted IS NOT 1 AND m.type IS NOT {folder} AND s.child IS NULL
             UNION ALL
             SELECT m.guid AS guid, m.type AS type
             FROM {values} m LEFT JOIN {structure} s ON s.parent = m.guid
             WHERE m.is_deleted IS NOT 1 AND m.type IS {folder} AND s.parent IS NULL",
            values = values,
            structure = structure,
            folder = BookmarkNodeType::Folder as u8,
        ),
        [],
        |row| -> rusqlite::Result<_> { Ok((row.get(0)?, row.get(1)?)) },
    )?;
    for (guid, type_code) in remainder {
        if tree.lookup.contains_key(&guid) {
            continue;
        }
        let node = BookmarkTreeNode::for_type(guid.clone(), type_code);
        if !matches!(node, BookmarkTreeNode::Folder { .. }) {
            tree.orphans.insert(guid.clone());
        }
        tree.lookup.insert(guid, node);
    }

    let mut subtrees: Vec<Guid> = tree
        .lookup
        .keys()
        .filter(|guid| !tree.parents.contains_key(*guid))
        .cloned()
        .collect();
    subtrees.sort();
    tree.subtrees = subtrees;

    tree.check_for_cycles()?;
    log::debug!(
        "Built {} tree: {} nodes, {} subtrees, {} deleted",
        plane,
        tree.lookup.len(),
        tree.subtrees.len(),
        tree.deleted.len()
    );
    Ok(tree)
}
