//! Name and number trees.
//!
//! A tree is a balanced index stored as document dictionaries. Leaves hold a flat run of
//! `key value` pairs under `/Names` (string keys) or `/Nums` (integer keys); intermediate
//! nodes hold `/Kids` references. Every node except the root carries `/Limits [low high]`,
//! the smallest and largest key below it, used to route lookups.
//!
//! Node sizes are governed by the low order `L` of
//! [`DocumentOptions::tree_low_order`](crate::DocumentOptions::tree_low_order): non-root
//! leaves hold `L..=2L` pairs and non-root intermediate nodes `L..=2L` kids. Insertion
//! splits full nodes on the way down and removal rebalances undersized ones on the way
//! down, so no operation ever has to walk back up.
//!
//! ## Examples
//!
//! ```rust
//! use pdf_cos::{Document, NameTree, PdfString, Value};
//!
//! let mut doc = Document::new();
//! let tree = NameTree::create(&mut doc);
//! for i in 0..50 {
//!     let key = PdfString::from(format!("key{:02}", i));
//!     tree.insert(&mut doc, key, Value::from(i), false).unwrap();
//! }
//!
//! let found = tree.get(&mut doc, &PdfString::from("key07")).unwrap();
//! assert_eq!(found, Some(Value::from(7)));
//! assert_eq!(tree.len(&mut doc).unwrap(), 50);
//! ```

use crate::error::{Error, Result};
use crate::value::{ContainerKind, NodeId, ObjectId, PdfString, Value};
use crate::Document;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Key type of a tree, which also decides the leaf entry name.
pub trait TreeKey: Ord + Clone + fmt::Display {
    /// Leaf entry holding the pairs: `Names` or `Nums`.
    const ENTRIES: &'static str;

    fn from_value(value: &Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

impl TreeKey for PdfString {
    const ENTRIES: &'static str = "Names";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_string().cloned()
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl TreeKey for i64 {
    const ENTRIES: &'static str = "Nums";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
}

/// Shape summary returned by [`Tree::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Number of node levels; a lone root leaf has height 1.
    pub height: usize,
    pub leaves: usize,
    pub entries: usize,
}

/// A name or number tree rooted at a dictionary of a document.
///
/// The tree value only remembers its root; every operation takes the document it lives
/// in.
pub struct Tree<K> {
    root: Value,
    _key: PhantomData<fn() -> K>,
}

/// Tree keyed by byte strings (`/Names`).
pub type NameTree = Tree<PdfString>;

/// Tree keyed by integers (`/Nums`).
pub type NumberTree = Tree<i64>;

impl<K> Clone for Tree<K> {
    fn clone(&self) -> Self {
        Tree {
            root: self.root.clone(),
            _key: PhantomData,
        }
    }
}

impl<K> fmt::Debug for Tree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree").field("root", &self.root).finish()
    }
}

#[derive(Clone, Debug)]
struct TreeNode {
    dict: Value,
    /// Resolved `Kids` or pairs array; `Null` for an empty root.
    items: Value,
    leaf: bool,
}

enum Rebalanced {
    Descend(usize),
    Collapsed,
}

impl<K: TreeKey> Tree<K> {
    /// Wraps an existing root dictionary (or a reference to one).
    pub fn new(root: Value) -> Self {
        Tree {
            root,
            _key: PhantomData,
        }
    }

    /// Registers an empty root leaf and returns the tree.
    pub fn create(doc: &mut Document) -> Self {
        let items = doc.new_array();
        let root = doc.new_dictionary_with([(K::ENTRIES, items)]);
        let id = doc.register(root);
        Tree::new(Value::Reference(id))
    }

    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    fn min_count(doc: &Document, leaf: bool) -> usize {
        let low = doc.options().tree_low_order;
        if leaf {
            2 * low
        } else {
            low
        }
    }

    fn max_count(doc: &Document, leaf: bool) -> usize {
        2 * Self::min_count(doc, leaf)
    }

    fn count(doc: &Document, node: &TreeNode) -> usize {
        doc.array_len(&node.items).unwrap_or(0)
    }

    fn open_node(doc: &mut Document, value: &Value, root: bool) -> Result<TreeNode> {
        let dict = doc.resolve(value);
        if !dict.is_dictionary() {
            return Err(Error::malformed(format!(
                "tree node is a {}, not a dictionary",
                dict.kind()
            )));
        }
        let kids = doc.dict_get_resolved(&dict, "Kids");
        if kids.is_array() {
            return Ok(TreeNode {
                dict,
                items: kids,
                leaf: false,
            });
        }
        let pairs = doc.dict_get_resolved(&dict, K::ENTRIES);
        if pairs.is_array() || root {
            return Ok(TreeNode {
                dict,
                items: pairs,
                leaf: true,
            });
        }
        Err(Error::malformed(format!(
            "tree node has neither Kids nor {}",
            K::ENTRIES
        )))
    }

    fn open_root(&self, doc: &mut Document) -> Result<TreeNode> {
        Self::open_node(doc, &self.root, true)
    }

    fn key_at(doc: &Document, items: &Value, index: usize) -> Result<K> {
        doc.array_get(items, index)
            .map(|value| doc.peek(&value))
            .as_ref()
            .and_then(K::from_value)
            .ok_or_else(|| Error::malformed(format!("invalid tree key at position {}", index)))
    }

    /// Pair index of `key` in a leaf, or the insertion point when absent.
    fn search_pairs(doc: &Document, items: &Value, key: &K) -> Result<(usize, bool)> {
        let pairs = doc.array_len(items).unwrap_or(0) / 2;
        let (mut low, mut high) = (0, pairs);
        while low < high {
            let mid = (low + high) / 2;
            match Self::key_at(doc, items, 2 * mid)?.cmp(key) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok((mid, true)),
            }
        }
        Ok((low, false))
    }

    /// Key range of a node: its `Limits` when present, computed from its content otherwise.
    fn limits_of(doc: &mut Document, node: &TreeNode) -> Result<Option<(K, K)>> {
        if let Some(limits) = doc.dict_get(&node.dict, "Limits") {
            let limits = doc.resolve(&limits);
            let low = doc.array_get(&limits, 0).as_ref().and_then(K::from_value);
            let high = doc.array_get(&limits, 1).as_ref().and_then(K::from_value);
            if let (Some(low), Some(high)) = (low, high) {
                return Ok(Some((low, high)));
            }
        }
        Self::content_range(doc, node)
    }

    fn content_range(doc: &mut Document, node: &TreeNode) -> Result<Option<(K, K)>> {
        match (
            Self::edge_key(doc, node, false)?,
            Self::edge_key(doc, node, true)?,
        ) {
            (Some(low), Some(high)) => Ok(Some((low, high))),
            _ => Ok(None),
        }
    }

    /// Smallest (or largest) key below `node`, trusting the `Limits` of kids.
    fn edge_key(doc: &mut Document, node: &TreeNode, last: bool) -> Result<Option<K>> {
        let max_depth = doc.options().max_tree_depth;
        let mut node = node.clone();
        for _ in 0..=max_depth {
            let count = Self::count(doc, &node);
            if node.leaf {
                if count < 2 {
                    return Ok(None);
                }
                let index = if last { (count / 2 - 1) * 2 } else { 0 };
                return Self::key_at(doc, &node.items, index).map(Some);
            }
            if count == 0 {
                return Ok(None);
            }
            let kid = doc
                .array_get(&node.items, if last { count - 1 } else { 0 })
                .unwrap_or_default();
            let kid = Self::open_node(doc, &kid, false)?;
            if let Some(limits) = doc.dict_get(&kid.dict, "Limits") {
                let limits = doc.resolve(&limits);
                if let Some(key) = doc
                    .array_get(&limits, usize::from(last))
                    .as_ref()
                    .and_then(K::from_value)
                {
                    return Ok(Some(key));
                }
            }
            node = kid;
        }
        Err(Error::malformed("tree is deeper than the configured limit"))
    }

    fn refresh_limits(doc: &mut Document, node: &TreeNode) -> Result<()> {
        let range = Self::content_range(doc, node)?;
        let current = doc.dict_get(&node.dict, "Limits").map(|l| doc.resolve(&l));
        match range {
            Some((low, high)) => {
                let unchanged = current.as_ref().map_or(false, |limits| {
                    doc.array_len(limits) == Some(2)
                        && doc.array_get(limits, 0).as_ref().and_then(K::from_value).as_ref()
                            == Some(&low)
                        && doc.array_get(limits, 1).as_ref().and_then(K::from_value).as_ref()
                            == Some(&high)
                });
                if !unchanged {
                    let limits = doc.new_array_with(vec![low.to_value(), high.to_value()]);
                    doc.dict_set(&node.dict, "Limits", limits)?;
                }
            }
            None => {
                if current.is_some() {
                    doc.dict_remove(&node.dict, "Limits")?;
                }
            }
        }
        Ok(())
    }

    /// Kid of `items` whose range contains `key`.
    fn find_kid(doc: &mut Document, items: &Value, key: &K) -> Result<Option<usize>> {
        let (mut low, mut high) = (0, doc.array_len(items).unwrap_or(0));
        while low < high {
            let mid = (low + high) / 2;
            let kid = doc.array_get(items, mid).unwrap_or_default();
            let kid = Self::open_node(doc, &kid, false)?;
            match Self::limits_of(doc, &kid)? {
                Some((first, _)) if key < &first => high = mid,
                Some((_, last)) if key > &last => low = mid + 1,
                Some(_) => return Ok(Some(mid)),
                None => low = mid + 1,
            }
        }
        Ok(None)
    }

    /// Kid an insertion of `key` descends into: the first whose upper limit is not
    /// below `key`, or the last one.
    fn insertion_kid(doc: &mut Document, items: &Value, key: &K) -> Result<usize> {
        let count = doc.array_len(items).unwrap_or(0);
        let (mut low, mut high) = (0, count);
        while low < high {
            let mid = (low + high) / 2;
            let kid = doc.array_get(items, mid).unwrap_or_default();
            let kid = Self::open_node(doc, &kid, false)?;
            match Self::limits_of(doc, &kid)? {
                Some((_, last)) if &last < key => low = mid + 1,
                _ => high = mid,
            }
        }
        Ok(low.min(count.saturating_sub(1)))
    }

    /// Looks `key` up. The value is returned as stored (references are not followed).
    ///
    /// # Errors
    ///
    /// [`Error::MalformedStructure`] for a node that is neither a leaf nor an intermediate
    /// node, or for a descent deeper than the configured limit.
    pub fn get(&self, doc: &mut Document, key: &K) -> Result<Option<Value>> {
        let max_depth = doc.options().max_tree_depth;
        let mut node = self.open_root(doc)?;
        for _ in 0..=max_depth {
            if node.leaf {
                let (index, found) = Self::search_pairs(doc, &node.items, key)?;
                return Ok(if found {
                    doc.array_get(&node.items, 2 * index + 1)
                } else {
                    None
                });
            }
            let Some(index) = Self::find_kid(doc, &node.items, key)? else {
                return Ok(None);
            };
            let kid = doc.array_get(&node.items, index).unwrap_or_default();
            node = Self::open_node(doc, &kid, false)?;
        }
        Err(Error::malformed("tree is deeper than the configured limit"))
    }

    pub fn contains_key(&self, doc: &mut Document, key: &K) -> Result<bool> {
        Ok(self.get(doc, key)?.is_some())
    }

    /// Inserts `key`, replacing an existing value only when `overwrite` is set.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateKey`] when `key` exists and `overwrite` is `false`
    /// - [`Error::MalformedStructure`] for a malformed tree
    pub fn insert(&self, doc: &mut Document, key: K, value: Value, overwrite: bool) -> Result<()> {
        let max_depth = doc.options().max_tree_depth;
        let mut node = self.open_root(doc)?;
        if Self::count(doc, &node) >= Self::max_count(doc, node.leaf) {
            node = Self::split_root(doc, &node)?;
        }

        let mut path: Vec<TreeNode> = Vec::new();
        for _ in 0..=max_depth {
            if node.leaf {
                let items = Self::ensure_items(doc, &mut node)?;
                let (index, found) = Self::search_pairs(doc, &items, &key)?;
                if found {
                    if !overwrite {
                        return Err(Error::DuplicateKey(key.to_string()));
                    }
                    doc.array_set(&items, 2 * index + 1, value)?;
                } else {
                    doc.array_insert(&items, 2 * index, key.to_value())?;
                    doc.array_insert(&items, 2 * index + 1, value)?;
                }
                for touched in path.iter().rev() {
                    Self::refresh_limits(doc, touched)?;
                }
                return Ok(());
            }

            if Self::count(doc, &node) == 0 {
                return Err(Error::malformed("intermediate tree node without kids"));
            }
            let index = Self::insertion_kid(doc, &node.items, &key)?;
            let kid = doc.array_get(&node.items, index).unwrap_or_default();
            let mut child = Self::open_node(doc, &kid, false)?;
            if Self::count(doc, &child) >= Self::max_count(doc, child.leaf) {
                // The new sibling takes the lower half and sits at `index`.
                Self::split(doc, &node.items, index, &child)?;
                let lower = doc.array_get(&node.items, index).unwrap_or_default();
                let lower = Self::open_node(doc, &lower, false)?;
                if let Some((_, last)) = Self::limits_of(doc, &lower)? {
                    if key <= last {
                        child = lower;
                    }
                }
            }
            path.push(child.clone());
            node = child;
        }
        Err(Error::malformed("tree is deeper than the configured limit"))
    }

    fn ensure_items(doc: &mut Document, node: &mut TreeNode) -> Result<Value> {
        if node.items.is_null() {
            let items = doc.new_array();
            doc.dict_set(&node.dict, K::ENTRIES, items)?;
            node.items = doc.dict_get_resolved(&node.dict, K::ENTRIES);
        }
        Ok(node.items.clone())
    }

    fn entry_name(leaf: bool) -> &'static str {
        if leaf {
            K::ENTRIES
        } else {
            "Kids"
        }
    }

    /// Moves the root content into a new child so the root can take a sibling, then
    /// splits that child.
    fn split_root(doc: &mut Document, root: &TreeNode) -> Result<TreeNode> {
        let name = Self::entry_name(root.leaf);
        let items_id = root
            .items
            .node_id()
            .ok_or_else(|| Error::malformed("tree root has no item array"))?;
        let count = Self::count(doc, root);
        let moved = doc.splice_items(items_id, 0, count, Vec::new());
        let child_items = doc.new_array_with(moved);
        let child = doc.new_dictionary_with([(name, child_items.clone())]);
        let child_id = doc.register(child.clone());

        doc.dict_remove(&root.dict, name)?;
        let kids = doc.new_array_with(vec![Value::Reference(child_id)]);
        doc.dict_set(&root.dict, "Kids", kids.clone())?;
        debug!(child = %child_id, "tree root split");

        let child = TreeNode {
            dict: child,
            items: child_items,
            leaf: root.leaf,
        };
        Self::split(doc, &kids, 0, &child)?;
        Ok(TreeNode {
            dict: root.dict.clone(),
            items: kids,
            leaf: false,
        })
    }

    /// Moves the lower half of the full `child` into a new sibling inserted right before
    /// it in `parent_items`.
    fn split(doc: &mut Document, parent_items: &Value, index: usize, child: &TreeNode) -> Result<()> {
        let min = Self::min_count(doc, child.leaf);
        let items_id = child
            .items
            .node_id()
            .ok_or_else(|| Error::malformed("tree node has no item array"))?;
        let moved = doc.splice_items(items_id, 0, min, Vec::new());
        let sibling_items = doc.new_array_with(moved);
        let sibling = doc.new_dictionary_with([(Self::entry_name(child.leaf), sibling_items.clone())]);
        let sibling_id = doc.register(sibling.clone());
        doc.array_insert(parent_items, index, Value::Reference(sibling_id))?;

        let sibling = TreeNode {
            dict: sibling,
            items: sibling_items,
            leaf: child.leaf,
        };
        Self::refresh_limits(doc, &sibling)?;
        Self::refresh_limits(doc, child)?;
        debug!(sibling = %sibling_id, leaf = child.leaf, "tree node split");
        Ok(())
    }

    /// Removes `key`. Returns `false` when it was absent.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedStructure`] for a malformed tree.
    pub fn remove(&self, doc: &mut Document, key: &K) -> Result<bool> {
        let max_depth = doc.options().max_tree_depth;
        let mut node = self.open_root(doc)?;
        let mut path: Vec<TreeNode> = Vec::new();
        for _ in 0..=2 * max_depth + 1 {
            if node.leaf {
                let (index, found) = Self::search_pairs(doc, &node.items, key)?;
                if found {
                    doc.array_remove(&node.items, 2 * index)?;
                    doc.array_remove(&node.items, 2 * index)?;
                }
                for touched in path.iter().rev() {
                    Self::refresh_limits(doc, touched)?;
                }
                return Ok(found);
            }

            let Some(mut index) = Self::find_kid(doc, &node.items, key)? else {
                for touched in path.iter().rev() {
                    Self::refresh_limits(doc, touched)?;
                }
                return Ok(false);
            };
            let kid = doc.array_get(&node.items, index).unwrap_or_default();
            let mut child = Self::open_node(doc, &kid, false)?;
            if Self::count(doc, &child) <= Self::min_count(doc, child.leaf) {
                match Self::rebalance(doc, &node, index, &child)? {
                    Rebalanced::Descend(at) => index = at,
                    Rebalanced::Collapsed => {
                        node = Self::open_node(doc, &node.dict, path.is_empty())?;
                        if let Some(last) = path.last_mut() {
                            *last = node.clone();
                        }
                        continue;
                    }
                }
                let kid = doc.array_get(&node.items, index).unwrap_or_default();
                child = Self::open_node(doc, &kid, false)?;
            }
            path.push(child.clone());
            node = child;
        }
        Err(Error::malformed("tree is deeper than the configured limit"))
    }

    /// Makes sure kid `index` of `parent` can lose an item: borrow from the left
    /// sibling, else from the right one, else merge with a sibling.
    fn rebalance(
        doc: &mut Document,
        parent: &TreeNode,
        index: usize,
        child: &TreeNode,
    ) -> Result<Rebalanced> {
        let stride = if child.leaf { 2 } else { 1 };
        let min = Self::min_count(doc, child.leaf);
        let kids = Self::count(doc, parent);
        let child_items = Self::items_id(child)?;

        let left = match index.checked_sub(1) {
            Some(at) => {
                let kid = doc.array_get(&parent.items, at).unwrap_or_default();
                Some(Self::open_node(doc, &kid, false)?)
            }
            None => None,
        };
        if let Some(left) = &left {
            let count = Self::count(doc, left);
            if count > min {
                let moved = doc.splice_items(Self::items_id(left)?, count - stride, stride, Vec::new());
                doc.splice_items(child_items, 0, 0, moved);
                Self::refresh_limits(doc, left)?;
                Self::refresh_limits(doc, child)?;
                return Ok(Rebalanced::Descend(index));
            }
        }

        let right = if index + 1 < kids {
            let kid = doc.array_get(&parent.items, index + 1).unwrap_or_default();
            Some(Self::open_node(doc, &kid, false)?)
        } else {
            None
        };
        if let Some(right) = &right {
            if Self::count(doc, right) > min {
                let moved = doc.splice_items(Self::items_id(right)?, 0, stride, Vec::new());
                let end = Self::count(doc, child);
                doc.splice_items(child_items, end, 0, moved);
                Self::refresh_limits(doc, right)?;
                Self::refresh_limits(doc, child)?;
                return Ok(Rebalanced::Descend(index));
            }
        }

        let (survivor, merged, merged_at, descend) = match (left, right) {
            (Some(left), _) => (left, child.clone(), index, index - 1),
            (None, Some(right)) => (child.clone(), right, index + 1, index),
            (None, None) => return Ok(Rebalanced::Descend(index)),
        };
        let count = Self::count(doc, &merged);
        let moved = doc.splice_items(Self::items_id(&merged)?, 0, count, Vec::new());
        let end = Self::count(doc, &survivor);
        doc.splice_items(Self::items_id(&survivor)?, end, 0, moved);
        let removed = doc.array_remove(&parent.items, merged_at)?;
        if let Value::Reference(id) = removed {
            doc.delete(id)?;
        }
        Self::refresh_limits(doc, &survivor)?;
        debug!(kids = kids - 1, "tree nodes merged");

        if kids - 1 == 1 {
            Self::collapse(doc, parent, &survivor)?;
            return Ok(Rebalanced::Collapsed);
        }
        Ok(Rebalanced::Descend(descend))
    }

    /// Replaces the content of `parent` with that of its only kid.
    fn collapse(doc: &mut Document, parent: &TreeNode, only: &TreeNode) -> Result<()> {
        let count = Self::count(doc, only);
        let moved = doc.splice_items(Self::items_id(only)?, 0, count, Vec::new());
        let kid = doc.array_get(&parent.items, 0).unwrap_or_default();
        doc.dict_remove(&parent.dict, "Kids")?;
        let items = doc.new_array_with(moved);
        doc.dict_set(&parent.dict, Self::entry_name(only.leaf), items)?;
        if let Value::Reference(id) = kid {
            doc.delete(id)?;
        }
        debug!(leaf = only.leaf, "tree level collapsed");
        Ok(())
    }

    fn items_id(node: &TreeNode) -> Result<NodeId> {
        node.items
            .node_id()
            .ok_or_else(|| Error::malformed("tree node has no item array"))
    }

    /// Lazy in-order iteration over the pairs.
    pub fn iter<'d>(&self, doc: &'d mut Document) -> TreeIter<'d, K> {
        TreeIter::new(doc, &self.root)
    }

    /// Number of pairs. Walks every leaf.
    pub fn len(&self, doc: &mut Document) -> Result<usize> {
        let mut count = 0;
        for pair in self.iter(doc) {
            pair?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self, doc: &mut Document) -> Result<bool> {
        match self.iter(doc).next() {
            None => Ok(true),
            Some(pair) => pair.map(|_| false),
        }
    }

    pub fn keys(&self, doc: &mut Document) -> Result<Vec<K>> {
        self.iter(doc).map(|pair| pair.map(|(key, _)| key)).collect()
    }

    pub fn values(&self, doc: &mut Document) -> Result<Vec<Value>> {
        self.iter(doc).map(|pair| pair.map(|(_, value)| value)).collect()
    }

    /// Removes every pair, deleting the intermediate and leaf objects below the root.
    pub fn clear(&self, doc: &mut Document) -> Result<()> {
        let root = self.open_root(doc)?;
        let max_depth = doc.options().max_tree_depth;
        let mut visited: HashSet<ObjectId> = HashSet::new();
        let mut stack: Vec<(Value, usize)> = Vec::new();
        if !root.leaf {
            for kid in doc.array_items(&root.items).unwrap_or_default() {
                stack.push((kid, 1));
            }
        }
        let mut deleted = 0usize;
        while let Some((kid, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(Error::malformed("tree is deeper than the configured limit"));
            }
            let node = Self::open_node(doc, &kid, false)?;
            if !node.leaf {
                for grandchild in doc.array_items(&node.items).unwrap_or_default() {
                    stack.push((grandchild, depth + 1));
                }
            }
            if let Value::Reference(id) = kid {
                if visited.insert(id) {
                    doc.delete(id)?;
                    deleted += 1;
                }
            }
        }

        doc.dict_remove(&root.dict, "Kids")?;
        let items = doc.new_array();
        doc.dict_set(&root.dict, K::ENTRIES, items)?;
        debug!(deleted, "tree cleared");
        Ok(())
    }

    /// Checks ordering, `Limits`, node sizes and leaf depths.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedStructure`] describing the first violation found.
    pub fn validate(&self, doc: &mut Document) -> Result<TreeStats> {
        let max_depth = doc.options().max_tree_depth;
        let root = self.open_root(doc)?;
        let mut stats = TreeStats::default();
        let mut leaf_depth: Option<usize> = None;
        let mut previous: Option<K> = None;
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<(TreeNode, usize, bool)> = vec![(root, 1, true)];

        while let Some((node, depth, is_root)) = stack.pop() {
            if depth > max_depth {
                return Err(Error::malformed("tree is deeper than the configured limit"));
            }
            if let Some(id) = node.dict.node_id() {
                if !visited.insert(id) {
                    return Err(Error::malformed("tree node reachable twice"));
                }
            }
            let count = Self::count(doc, &node);
            let (min, max) = (Self::min_count(doc, node.leaf), Self::max_count(doc, node.leaf));
            if count > max || (!is_root && count < min) {
                return Err(Error::malformed(format!(
                    "tree node holds {} items, expected {}..={}",
                    count, min, max
                )));
            }
            if !is_root {
                let stored = match doc.dict_get(&node.dict, "Limits") {
                    Some(limits) => {
                        let limits = doc.resolve(&limits);
                        let low = doc.array_get(&limits, 0).as_ref().and_then(K::from_value);
                        let high = doc.array_get(&limits, 1).as_ref().and_then(K::from_value);
                        low.zip(high)
                    }
                    None => None,
                };
                if stored.is_none() || stored != Self::content_range(doc, &node)? {
                    return Err(Error::malformed("tree node Limits do not match its content"));
                }
            }

            if node.leaf {
                match leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(Error::malformed("tree leaves are at different depths"));
                    }
                    _ => leaf_depth = Some(depth),
                }
                stats.leaves += 1;
                for index in (0..count / 2).map(|pair| pair * 2) {
                    let key = Self::key_at(doc, &node.items, index)?;
                    if previous.as_ref().map_or(false, |p| p >= &key) {
                        return Err(Error::malformed(format!("tree key {} is out of order", key)));
                    }
                    previous = Some(key);
                    stats.entries += 1;
                }
            } else {
                if count == 0 {
                    return Err(Error::malformed("intermediate tree node without kids"));
                }
                let kids = doc.array_items(&node.items).unwrap_or_default();
                for kid in kids.iter().rev() {
                    let kid = Self::open_node(doc, kid, false)?;
                    stack.push((kid, depth + 1, false));
                }
            }
        }
        stats.height = leaf_depth.unwrap_or(1);
        Ok(stats)
    }
}

impl Document {
    /// The name tree of category `category` (`Dests`, `EmbeddedFiles`, ...) under the
    /// catalog's `Names` dictionary, created as a virtual default when missing.
    pub fn names_tree(&mut self, category: &str) -> Result<NameTree> {
        let catalog = self.catalog();
        let names = self.get_or_create(&catalog, "Names", ContainerKind::Dictionary, true)?;
        let root = self.get_or_create(&names, category, ContainerKind::Dictionary, false)?;
        Ok(NameTree::new(root))
    }
}

struct Frame {
    items: Value,
    position: usize,
    leaf: bool,
}

/// Depth-first iterator over the pairs of a tree, in ascending key order.
///
/// Yields `Err(MalformedStructure)` once, then stops, when a node is malformed, reachable
/// twice, or deeper than the configured limit.
pub struct TreeIter<'d, K> {
    doc: &'d mut Document,
    stack: Vec<Frame>,
    visited: HashSet<NodeId>,
    pending: Option<Error>,
    max_depth: usize,
    _key: PhantomData<fn() -> K>,
}

impl<'d, K: TreeKey> TreeIter<'d, K> {
    fn new(doc: &'d mut Document, root: &Value) -> Self {
        let max_depth = doc.options().max_tree_depth;
        let mut iter = TreeIter {
            doc,
            stack: Vec::new(),
            visited: HashSet::new(),
            pending: None,
            max_depth,
            _key: PhantomData,
        };
        if let Err(err) = iter.enter(root, true) {
            iter.pending = Some(err);
        }
        iter
    }

    fn enter(&mut self, value: &Value, root: bool) -> Result<()> {
        if self.stack.len() >= self.max_depth {
            return Err(Error::malformed("tree is deeper than the configured limit"));
        }
        let node = Tree::<K>::open_node(self.doc, value, root)?;
        if let Some(id) = node.dict.node_id() {
            if !self.visited.insert(id) {
                return Err(Error::malformed("tree node reachable twice"));
            }
        }
        self.stack.push(Frame {
            items: node.items,
            position: 0,
            leaf: node.leaf,
        });
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Option<Result<(K, Value)>> {
        self.stack.clear();
        Some(Err(err))
    }
}

impl<K: TreeKey> Iterator for TreeIter<'_, K> {
    type Item = Result<(K, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return self.fail(err);
        }
        loop {
            let frame = self.stack.last_mut()?;
            let len = self.doc.array_len(&frame.items).unwrap_or(0);
            let position = frame.position;
            if frame.leaf {
                if position + 1 >= len {
                    self.stack.pop();
                    continue;
                }
                frame.position += 2;
                let items = frame.items.clone();
                let value = self.doc.array_get(&items, position + 1).unwrap_or_default();
                return match Tree::<K>::key_at(self.doc, &items, position) {
                    Ok(key) => Some(Ok((key, value))),
                    Err(err) => self.fail(err),
                };
            }
            if position >= len {
                self.stack.pop();
                continue;
            }
            frame.position += 1;
            let kid = self.doc.array_get(&frame.items, position).unwrap_or_default();
            if let Err(err) = self.enter(&kid, false) {
                return self.fail(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentOptions;

    fn key(i: usize) -> PdfString {
        PdfString::from(format!("k{:04}", i))
    }

    #[test]
    fn test_empty_tree() {
        let mut doc = Document::new();
        let tree = NameTree::create(&mut doc);
        assert_eq!(tree.get(&mut doc, &key(1)).unwrap(), None);
        assert!(tree.is_empty(&mut doc).unwrap());
        assert!(!tree.remove(&mut doc, &key(1)).unwrap());
        assert_eq!(tree.validate(&mut doc).unwrap().height, 1);
    }

    #[test]
    fn test_insert_overwrite_and_duplicate() {
        let mut doc = Document::new();
        let tree = NameTree::create(&mut doc);
        tree.insert(&mut doc, key(1), Value::from(1), false).unwrap();
        assert!(matches!(
            tree.insert(&mut doc, key(1), Value::from(2), false),
            Err(Error::DuplicateKey(_))
        ));
        tree.insert(&mut doc, key(1), Value::from(3), true).unwrap();
        assert_eq!(tree.get(&mut doc, &key(1)).unwrap(), Some(Value::from(3)));
    }

    #[test]
    fn test_number_tree_orders_numerically() {
        let mut doc = Document::new();
        let tree = NumberTree::create(&mut doc);
        for n in [30i64, -2, 7, 100, 0] {
            tree.insert(&mut doc, n, Value::from(n), false).unwrap();
        }
        assert_eq!(tree.keys(&mut doc).unwrap(), vec![-2, 0, 7, 30, 100]);
        let root = doc.resolve(tree.root());
        assert!(doc.dict_contains(&root, "Nums"));
    }

    #[test]
    fn test_small_low_order_keeps_balance() {
        let mut doc = Document::with_options(DocumentOptions::new().with_tree_low_order(2));
        let tree = NameTree::create(&mut doc);
        for i in (0..60).rev() {
            tree.insert(&mut doc, key(i), Value::from(i), false).unwrap();
        }
        let stats = tree.validate(&mut doc).unwrap();
        assert_eq!(stats.entries, 60);
        assert!(stats.height >= 3);

        for i in (0..60).step_by(3) {
            assert!(tree.remove(&mut doc, &key(i)).unwrap());
            tree.validate(&mut doc).unwrap();
        }
        assert_eq!(tree.len(&mut doc).unwrap(), 40);
        assert_eq!(tree.get(&mut doc, &key(3)).unwrap(), None);
        assert_eq!(tree.get(&mut doc, &key(4)).unwrap(), Some(Value::from(4)));
    }

    #[test]
    fn test_remove_everything_collapses_to_leaf() {
        let mut doc = Document::with_options(DocumentOptions::new().with_tree_low_order(2));
        let tree = NameTree::create(&mut doc);
        for i in 0..30 {
            tree.insert(&mut doc, key(i), Value::Null, false).unwrap();
        }
        for i in 0..30 {
            assert!(tree.remove(&mut doc, &key(i)).unwrap());
        }
        let stats = tree.validate(&mut doc).unwrap();
        assert_eq!(stats, TreeStats { height: 1, leaves: 1, entries: 0 });
        let root = doc.resolve(tree.root());
        assert!(!doc.dict_contains(&root, "Kids"));
    }

    #[test]
    fn test_malformed_node_is_reported() {
        let mut doc = Document::new();
        let bogus = doc.new_dictionary_with([("Other", Value::from(1))]);
        let bogus = doc.register(bogus);
        let kids = doc.new_array_with(vec![Value::Reference(bogus)]);
        let root = doc.new_dictionary_with([("Kids", kids)]);
        let tree = NameTree::new(root);
        assert!(matches!(
            tree.get(&mut doc, &key(1)),
            Err(Error::MalformedStructure(_))
        ));
        assert!(tree.iter(&mut doc).any(|pair| pair.is_err()));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut doc = Document::new();
        let root = doc.new_dictionary();
        let root_id = doc.register(root.clone());
        let kids = doc.new_array_with(vec![Value::Reference(root_id)]);
        doc.dict_set(&root, "Kids", kids).unwrap();
        let tree = NameTree::new(Value::Reference(root_id));
        let results: Vec<_> = tree.iter(&mut doc).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_clear_deletes_nodes() {
        let mut doc = Document::with_options(DocumentOptions::new().with_tree_low_order(2));
        let tree = NameTree::create(&mut doc);
        for i in 0..20 {
            tree.insert(&mut doc, key(i), Value::Null, false).unwrap();
        }
        let before = doc.object_count();
        tree.clear(&mut doc).unwrap();
        assert!(doc.object_count() < before);
        assert!(tree.is_empty(&mut doc).unwrap());
        tree.insert(&mut doc, key(1), Value::Null, false).unwrap();
        assert_eq!(tree.len(&mut doc).unwrap(), 1);
    }

    #[test]
    fn test_names_tree_is_virtual_until_used() {
        let mut doc = Document::new();
        let tree = doc.names_tree("Dests").unwrap();
        let catalog = doc.catalog();
        assert!(doc.is_virtual(&doc.dict_get(&catalog, "Names").unwrap()));

        tree.insert(&mut doc, PdfString::from("intro"), Value::from(1), false)
            .unwrap();
        let names = doc.dict_get(&catalog, "Names").unwrap();
        assert!(!doc.is_virtual(&names));
        assert!(!doc.is_virtual(&doc.dict_get(&names, "Dests").unwrap()));
    }
}
