//! Container arena.
//!
//! Arrays, dictionaries and streams live in a per-document arena and are addressed by
//! [`NodeId`]. Each node records a weak link to its structural owner (another node, or the
//! indirect slot whose payload it is). The link is only used to propagate update state
//! upwards; ownership of a node never flows through it.

use crate::map::PdfMap;
use crate::value::{NodeId, ObjectId, Value};

/// The structural owner of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Nested inside another container.
    Container(NodeId),
    /// Payload of an indirect object.
    Object(ObjectId),
}

#[derive(Debug, Clone)]
pub(crate) struct StreamData {
    /// Dictionary node holding the stream header.
    pub header: NodeId,
    pub body: Vec<u8>,
    /// `false` while the data of an external file has not been pulled into `body`.
    pub body_resolved: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Array(Vec<Value>),
    Dictionary(PdfMap),
    Stream(StreamData),
}

impl NodeData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeData::Array(_) => "array",
            NodeData::Dictionary(_) => "dictionary",
            NodeData::Stream(_) => "stream",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub data: NodeData,
    pub owner: Option<Owner>,
    pub updated: bool,
    pub virtual_: bool,
}

/// Append-only storage for container nodes.
///
/// Nodes are never reclaimed while the document lives; detached nodes simply become
/// unreachable.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            owner: None,
            updated: false,
            virtual_: false,
        });
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Clears the `updated` flag of every node, after the document has been written.
    pub fn clear_updated(&mut self) {
        for node in &mut self.nodes {
            node.updated = false;
        }
    }

    pub fn items(&self, id: NodeId) -> Option<&Vec<Value>> {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Array(items)) => Some(items),
            _ => None,
        }
    }

    pub fn items_mut(&mut self, id: NodeId) -> Option<&mut Vec<Value>> {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Array(items)) => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self, id: NodeId) -> Option<&PdfMap> {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Dictionary(map)) => Some(map),
            _ => None,
        }
    }

    pub fn entries_mut(&mut self, id: NodeId) -> Option<&mut PdfMap> {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Dictionary(map)) => Some(map),
            _ => None,
        }
    }

    pub fn stream(&self, id: NodeId) -> Option<&StreamData> {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Stream(data)) => Some(data),
            _ => None,
        }
    }

    pub fn stream_mut(&mut self, id: NodeId) -> Option<&mut StreamData> {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Stream(data)) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_access() {
        let mut arena = Arena::default();
        let array = arena.alloc(NodeData::Array(vec![Value::from(1)]));
        let dict = arena.alloc(NodeData::Dictionary(PdfMap::new()));

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.items(array).map(|i| i.len()), Some(1));
        assert!(arena.items(dict).is_none());
        assert!(arena.entries(dict).is_some());
        assert!(arena.get(NodeId(9)).is_none());
    }
}
