// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registration index: which nodes of a scene listen to which event types.
//!
//! The index is never consulted by the dispatch algorithms. It exists for
//! per-frame work owned outside the dispatcher (for example continuous hit
//! testing, or fanning out `animate` events) that must only visit nodes with
//! an interest in a type.
//!
//! The tree keeps the index up to date:
//!
//! - [`RegistrationIndex::register`] when a node inside a scene gains its first
//!   listener of a type, [`RegistrationIndex::unregister`] when it loses the last one.
//! - [`RegistrationIndex::register_all`] for every node of a subtree attached to a
//!   scene, [`RegistrationIndex::unregister_all`] for every node of a subtree
//!   detached from one.
//! - [`RegistrationIndex::forget_scene`] when a scene root is removed.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::types::{EventType, NodeId};

/// Bookkeeping of listener presence, per scene root.
pub trait RegistrationIndex {
    /// `node` (inside `scene`) now has at least one listener of `ty`.
    fn register(&mut self, scene: NodeId, ty: EventType, node: NodeId);

    /// `node` (inside `scene`) no longer has listeners of `ty`.
    fn unregister(&mut self, scene: NodeId, ty: EventType, node: NodeId);

    /// `node` joined `scene` while listening to `types`.
    fn register_all(&mut self, scene: NodeId, node: NodeId, types: &[EventType]) {
        for &ty in types {
            self.register(scene, ty, node);
        }
    }

    /// `node` left `scene` while listening to `types`.
    fn unregister_all(&mut self, scene: NodeId, node: NodeId, types: &[EventType]) {
        for &ty in types {
            self.unregister(scene, ty, node);
        }
    }

    /// The scene root was removed from the tree.
    fn forget_scene(&mut self, scene: NodeId) {
        let _ = scene;
    }
}

/// An index that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIndex;

impl RegistrationIndex for NoIndex {
    fn register(&mut self, _: NodeId, _: EventType, _: NodeId) {}

    fn unregister(&mut self, _: NodeId, _: EventType, _: NodeId) {}
}

/// Default index: per scene, per type, the listening nodes in registration order.
#[derive(Clone, Debug, Default)]
pub struct SceneIndex {
    scenes: HashMap<NodeId, HashMap<EventType, Vec<NodeId>>>,
}

impl SceneIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes of `scene` listening to `ty`, in registration order.
    pub fn nodes(&self, scene: NodeId, ty: EventType) -> &[NodeId] {
        self.scenes
            .get(&scene)
            .and_then(|types| types.get(&ty))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `node` is registered for `ty` in `scene`.
    pub fn contains(&self, scene: NodeId, ty: EventType, node: NodeId) -> bool {
        self.nodes(scene, ty).contains(&node)
    }

    /// Whether any node of `scene` listens to `ty`.
    pub fn has_type(&self, scene: NodeId, ty: EventType) -> bool {
        !self.nodes(scene, ty).is_empty()
    }
}

impl RegistrationIndex for SceneIndex {
    fn register(&mut self, scene: NodeId, ty: EventType, node: NodeId) {
        let nodes = self.scenes.entry(scene).or_default().entry(ty).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    fn unregister(&mut self, scene: NodeId, ty: EventType, node: NodeId) {
        let Some(types) = self.scenes.get_mut(&scene) else {
            return;
        };
        if let Some(nodes) = types.get_mut(&ty) {
            nodes.retain(|n| *n != node);
            if nodes.is_empty() {
                types.remove(&ty);
            }
        }
    }

    fn forget_scene(&mut self, scene: NodeId) {
        self.scenes.remove(&scene);
    }
}
