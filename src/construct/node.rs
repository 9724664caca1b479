//! Hierarchical construct tree.
//!
//! Every node has a logical id, an optional owning scope and an ordered list
//! of children. Identity is fixed at construction and nodes are only ever
//! appended, so the tree cannot contain cycles.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{ConstructError, Result};

use super::resource::ResourceRecord;
use super::stack::StackConfig;

/// Separator between ids in a construct path.
pub const PATH_SEPARATOR: &str = "/";

/// A node in the construct tree.
///
/// `Construct` is a cheap handle: cloning it yields another handle to the
/// same node. Scope links are strong, so any handle keeps its ancestors
/// alive. Trees are never torn down before the process exits.
#[derive(Clone)]
pub struct Construct {
    node: Rc<Node>,
}

struct Node {
    id: String,
    scope: Option<Rc<Node>>,
    role: NodeRole,
    children: RefCell<Vec<Construct>>,
    metadata: RefCell<BTreeMap<String, Value>>,
}

/// What a node contributes to synthesis.
pub(crate) enum NodeRole {
    /// Plain grouping node.
    Group,
    /// Stack root carrying stack-level configuration.
    Stack(StackConfig),
    /// Resource carrying a derived property bag.
    Resource(Rc<ResourceRecord>),
}

impl Construct {
    /// Creates a root construct with no scope.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is empty or whitespace.
    pub fn root(id: &str) -> Result<Self> {
        Self::attach(None, id, NodeRole::Group)
    }

    /// Creates a plain grouping construct inside `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is empty or a sibling already uses it.
    pub fn new(scope: &impl AsRef<Self>, id: &str) -> Result<Self> {
        Self::attach(Some(scope.as_ref()), id, NodeRole::Group)
    }

    /// Checks that `id` can be used for a new child of `scope`.
    pub(crate) fn check_child_id(scope: Option<&Self>, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(ConstructError::EmptyIdentifier.into());
        }
        if let Some(scope) = scope
            && scope.child(id).is_some()
        {
            return Err(ConstructError::DuplicateIdentifier {
                scope: scope.path(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Creates a node with the given role and appends it to `scope`.
    pub(crate) fn attach(scope: Option<&Self>, id: &str, role: NodeRole) -> Result<Self> {
        Self::check_child_id(scope, id)?;

        let construct = Self {
            node: Rc::new(Node {
                id: id.to_string(),
                scope: scope.map(|s| Rc::clone(&s.node)),
                role,
                children: RefCell::new(Vec::new()),
                metadata: RefCell::new(BTreeMap::new()),
            }),
        };

        if let Some(scope) = scope {
            scope.node.children.borrow_mut().push(construct.clone());
        }

        Ok(construct)
    }

    /// The logical id of this node.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// The owning scope, if any.
    #[must_use]
    pub fn scope(&self) -> Option<Self> {
        self.node.scope.as_ref().map(|node| Self {
            node: Rc::clone(node),
        })
    }

    /// Direct children in insertion order.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        self.node.children.borrow().clone()
    }

    /// Looks up a direct child by id.
    #[must_use]
    pub fn child(&self, id: &str) -> Option<Self> {
        self.node
            .children
            .borrow()
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    /// Ids from the root down to this node.
    #[must_use]
    pub fn path_segments(&self) -> Vec<String> {
        let mut segments = vec![self.node.id.clone()];
        let mut current = self.scope();
        while let Some(scope) = current {
            segments.push(scope.node.id.clone());
            current = scope.scope();
        }
        segments.reverse();
        segments
    }

    /// Slash-delimited path from the root to this node.
    #[must_use]
    pub fn path(&self) -> String {
        self.path_segments().join(PATH_SEPARATOR)
    }

    /// Attaches a metadata entry, replacing any previous value for `key`.
    pub fn add_metadata(&self, key: impl Into<String>, value: Value) {
        self.node.metadata.borrow_mut().insert(key.into(), value);
    }

    /// Reads a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<Value> {
        self.node.metadata.borrow().get(key).cloned()
    }

    /// Pre-order traversal: this node, then each child's subtree in order.
    #[must_use]
    pub fn find_all(&self) -> Vec<Self> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<Self>) {
        out.push(self.clone());
        for child in self.node.children.borrow().iter() {
            child.collect_into(out);
        }
    }

    /// Returns true if this node is a stack.
    #[must_use]
    pub fn is_stack(&self) -> bool {
        matches!(self.node.role, NodeRole::Stack(_))
    }

    pub(crate) fn stack_config(&self) -> Option<&StackConfig> {
        match &self.node.role {
            NodeRole::Stack(config) => Some(config),
            _ => None,
        }
    }

    pub(crate) fn resource_record(&self) -> Option<&Rc<ResourceRecord>> {
        match &self.node.role {
            NodeRole::Resource(record) => Some(record),
            _ => None,
        }
    }

    /// Nearest stack at or above this node.
    #[must_use]
    pub fn nearest_stack(&self) -> Option<Self> {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.is_stack() {
                return Some(node);
            }
            current = node.scope();
        }
        None
    }

    /// Returns true if both handles point at the same node.
    #[must_use]
    pub fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl AsRef<Self> for Construct {
    fn as_ref(&self) -> &Self {
        self
    }
}

impl fmt::Debug for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Construct")
            .field("path", &self.path())
            .field("children", &self.node.children.borrow().len())
            .finish()
    }
}
