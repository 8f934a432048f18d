//! Single traversal primitive over state objects.

use super::state::StateObject;

/// What the traversal does after a node has been visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Descend into the children.
    Continue,
    /// Do not descend.
    Skip,
}

/// Visitor over a mutable state tree.
///
/// The default visits nothing and descends everywhere, so a visitor only
/// matches the node kinds it cares about.
pub trait StateVisitor {
    /// Called on every node before its children.
    fn visit(&mut self, _state: &mut StateObject) -> Visit {
        Visit::Continue
    }
}

/// Pre-order traversal.
pub fn traverse(state: &mut StateObject, visitor: &mut dyn StateVisitor) {
    if visitor.visit(state) == Visit::Skip {
        return;
    }
    for child in state.children_mut() {
        traverse(child, visitor);
    }
}
