// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, scene stamping, flags, and transforms.

use alloc::vec::Vec;

use glam::{Quat, Vec3};
use hashbrown::HashMap;

use crate::event::{Event, PropertyChange, PropertyValue, UpdateEvent};
use crate::index::{RegistrationIndex, SceneIndex};
use crate::registry::Registry;
use crate::scene::SceneState;
use crate::types::{EventType, InteractionDefaults, Instrumented, NodeFlags, NodeId, Transform};

/// A tree of scene nodes with event listeners.
///
/// The tree owns every node. Each node owns its ordered children; parent and
/// scene-root links are plain [`NodeId`]s. Identifiers are generational, so ids
/// of removed nodes go stale instead of aliasing new nodes. Operations on stale
/// ids are no-ops and queries on them return `None` or `false`.
///
/// Nodes become part of a scene when they are attached below a scene root
/// created with [`Tree::insert_scene`]. Each scene root owns one focus slot and a
/// [`SceneConfig`](crate::SceneConfig). The type parameter `I` is the
/// [`RegistrationIndex`] kept in sync with listener registrations; it defaults to
/// [`SceneIndex`].
///
/// Listeners receive `&mut Tree`, so everything here may be called from inside
/// a dispatch, including attaching and removing the node being visited.
///
/// ## Example
///
/// ```rust
/// use understory_scene_events::{Transform, Tree};
///
/// let mut tree = Tree::new();
/// let scene = tree.insert_scene(Default::default());
/// let group = tree.insert(Some(scene), Transform::default());
/// let leaf = tree.insert(Some(group), Transform::default());
///
/// assert_eq!(tree.scene_of(leaf), Some(scene));
/// tree.set_enabled(group, false);
/// assert!(tree.is_enabled(leaf));
/// assert!(!tree.enabled_state(leaf));
/// ```
pub struct Tree<I = SceneIndex> {
    /// slots
    nodes: Vec<Option<Node<I>>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    pub(crate) scenes: HashMap<NodeId, SceneState>,
    pub(crate) index: I,
    defaults: InteractionDefaults,
    clock: f64,
}

impl<I: core::fmt::Debug> core::fmt::Debug for Tree<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("scenes", &self.scenes.len())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<I: RegistrationIndex + Default> Default for Tree<I> {
    fn default() -> Self {
        Self::with_index(I::default())
    }
}

pub(crate) struct Node<I> {
    generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) scene: Option<NodeId>,
    pub(crate) flags: NodeFlags,
    pub(crate) instrumented: Instrumented,
    pub(crate) transform: Transform,
    pub(crate) drag_target: Option<NodeId>,
    pub(crate) registry: Option<Registry<I>>,
}

impl<I> Node<I> {
    fn new(generation: u32, transform: Transform, flags: NodeFlags) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            scene: None,
            flags,
            instrumented: Instrumented::empty(),
            transform,
            drag_target: None,
            registry: None,
        }
    }
}

impl Tree {
    /// Create an empty tree with the default [`SceneIndex`].
    pub fn new() -> Self {
        Self::with_index(SceneIndex::new())
    }
}

impl<I: RegistrationIndex> Tree<I> {
    /// Create an empty tree that reports registrations to `index`.
    pub fn with_index(index: I) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            scenes: HashMap::new(),
            index,
            defaults: InteractionDefaults::default(),
            clock: 0.0,
        }
    }

    /// Use `defaults` for nodes inserted from now on.
    pub fn with_defaults(mut self, defaults: InteractionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Defaults applied to newly inserted nodes.
    pub fn defaults(&self) -> InteractionDefaults {
        self.defaults
    }

    /// The registration index.
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Time in milliseconds stamped on events the tree constructs itself
    /// (focus transitions).
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Set the time reported by [`Tree::clock`]; usually called once per frame.
    pub fn set_clock(&mut self, now: f64) {
        self.clock = now;
    }

    /// Insert a new node, appended to `parent` if given.
    pub fn insert(&mut self, parent: Option<NodeId>, transform: Transform) -> NodeId {
        let id = self.alloc(transform, self.defaults.flags());
        if let Some(p) = parent {
            self.append(p, id);
        }
        id
    }

    pub(crate) fn alloc(&mut self, transform: Transform, flags: NodeFlags) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, transform, flags));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, transform, flags)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// `child` is first detached from its current parent. If `parent` belongs to a
    /// scene, every node of the child's subtree is stamped with that scene and its
    /// listener types are registered with the index.
    ///
    /// Ignored for stale ids, scene roots as `child`, and edits that would create
    /// a cycle.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_alive(parent) || !self.is_alive(child) || self.is_scene_root(child) {
            return;
        }
        if self.is_ancestor_or_self(child, parent) {
            tracing::debug!(?parent, ?child, "ignoring append that would create a cycle");
            return;
        }
        if self.node(child).parent.is_some() {
            self.detach(child);
            // A blur listener fired by the detach may have moved things around.
            if !self.is_alive(parent) || !self.is_alive(child) || self.node(child).parent.is_some()
            {
                return;
            }
            if self.is_ancestor_or_self(child, parent) {
                return;
            }
        }
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        if let Some(scene) = self.node(parent).scene {
            self.stamp_scene(child, scene);
        }
    }

    /// Detach `node` from its parent, keeping it (and its subtree) alive.
    ///
    /// If the subtree holds its scene's focused node, focus is cleared first,
    /// which fires the usual blur sequence. The subtree then loses its scene
    /// reference and its registrations are removed from the index.
    pub fn detach(&mut self, node: NodeId) {
        if !self.is_alive(node) {
            return;
        }
        if let Some(scene) = self.node(node).scene
            && self.node(node).parent.is_some()
            && let Some(focused) = self.focused(scene)
            && self.is_ancestor_or_self(node, focused)
        {
            self.focus(scene, None);
            if !self.is_alive(node) {
                return;
            }
        }
        let Some(parent) = self.node(node).parent else {
            return;
        };
        self.node_mut(parent).children.retain(|c| *c != node);
        self.node_mut(node).parent = None;
        if self.node(node).scene.is_some() {
            self.unstamp_scene(node);
        }
    }

    /// Remove `node` and its subtree from the tree.
    ///
    /// Removing a scene root drops its focus slot and its index bookkeeping.
    pub fn remove(&mut self, node: NodeId) {
        if !self.is_alive(node) {
            return;
        }
        if self.is_scene_root(node) {
            self.scenes.remove(&node);
            self.index.forget_scene(node);
        } else {
            self.detach(node);
            if !self.is_alive(node) {
                return;
            }
            if let Some(parent) = self.node(node).parent {
                // Re-attached by a listener during the detach.
                self.node_mut(parent).children.retain(|c| *c != node);
                self.node_mut(node).parent = None;
                self.unstamp_scene(node);
            }
        }
        self.free_subtree(node);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = core::mem::take(&mut self.node_mut(id).children);
        for child in children {
            if self.is_alive(child) {
                self.free_subtree(child);
            }
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    fn stamp_scene(&mut self, id: NodeId, scene: NodeId) {
        self.node_mut(id).scene = Some(scene);
        let types = self.active_types(id);
        if !types.is_empty() {
            self.index.register_all(scene, id, &types);
        }
        let children = self.node(id).children.clone();
        for child in children {
            self.stamp_scene(child, scene);
        }
    }

    fn unstamp_scene(&mut self, id: NodeId) {
        if let Some(scene) = self.node_mut(id).scene.take() {
            let types = self.active_types(id);
            if !types.is_empty() {
                self.index.unregister_all(scene, id, &types);
            }
        }
        let children = self.node(id).children.clone();
        for child in children {
            self.unstamp_scene(child);
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some_and(|n| n.generation == id.1)
    }

    /// Returns the parent of a node if live, or `None` for roots or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// Get the children of a node, or empty slice if node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        match self.node_opt(id) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    /// The scene root `id` belongs to. A scene root belongs to itself.
    pub fn scene_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.scene)
    }

    /// Whether `id` is a scene root.
    pub fn is_scene_root(&self, id: NodeId) -> bool {
        self.scenes.contains_key(&id) && self.is_alive(id)
    }

    /// Returns the flags of a node if the identifier is live.
    pub fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        self.node_opt(id).map(|n| n.flags)
    }

    /// Change notifications switched on for a node.
    pub fn instrumented(&self, id: NodeId) -> Option<Instrumented> {
        self.node_opt(id).map(|n| n.instrumented)
    }

    fn has_flag(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.node_opt(id).is_some_and(|n| n.flags.contains(flag))
    }

    /// The node's own `enabled` flag.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::ENABLED)
    }

    /// The node's own `visible` flag.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::VISIBLE)
    }

    /// Whether the node is the focus target of its scene.
    pub fn is_focused(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::FOCUSED)
    }

    /// Whether the primary pointer is over the node.
    pub fn is_hovered(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::HOVERED)
    }

    /// Whether a press started on the node and has not been released.
    pub fn is_clicking(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::CLICKING)
    }

    /// Whether the node is being dragged.
    pub fn is_dragging(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::DRAGGING)
    }

    /// Whether the node listens to `drop`, `dragenter`, `dragleave`, or `dragover`.
    pub fn is_drop_target(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::DROP_TARGET)
    }

    /// Whether the node takes part in pointer interaction.
    pub fn is_interactable(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::INTERACTABLE)
    }

    /// Whether the node can receive focus.
    pub fn is_focusable(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::FOCUSABLE)
    }

    /// Whether the node can be dragged.
    pub fn is_draggable(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::DRAGGABLE)
    }

    /// Whether the node searches for drop targets while dragged.
    pub fn finds_drop_target(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::FIND_DROP_TARGET)
    }

    /// Whether the node and its subtree can be intercepted by the main raycaster.
    pub fn intercepts_raycaster(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::INTERCEPT_BY_RAYCASTER)
    }

    /// `enabled` of the node and every ancestor, ANDed.
    pub fn enabled_state(&self, id: NodeId) -> bool {
        self.all_ancestors_have(id, NodeFlags::ENABLED)
    }

    /// `visible` of the node and every ancestor, ANDed.
    pub fn visibility_state(&self, id: NodeId) -> bool {
        self.all_ancestors_have(id, NodeFlags::VISIBLE)
    }

    fn all_ancestors_have(&self, id: NodeId, flag: NodeFlags) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let mut current = Some(id);
        while let Some(n) = current.and_then(|c| self.node_opt(c)) {
            if !n.flags.contains(flag) {
                return false;
            }
            current = n.parent;
        }
        true
    }

    /// The node itself or its nearest focusable ancestor.
    pub fn first_focusable(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(c) = current {
            let n = self.node_opt(c)?;
            if n.flags.contains(NodeFlags::FOCUSABLE) {
                return Some(c);
            }
            current = n.parent;
        }
        None
    }

    /// Set the node's own `enabled` flag.
    ///
    /// Disabling the focused node clears its scene's focus first. Any change is
    /// then broadcast as `enabledchange` to the node and its whole subtree,
    /// whatever the state of its ancestors. Setting the current value does nothing.
    pub fn set_enabled(&mut self, id: NodeId, value: bool) {
        if !self.is_alive(id) || self.is_enabled(id) == value {
            return;
        }
        if !value {
            self.blur_if_focused(id);
            // Blur listeners may have changed the flag themselves.
            if !self.is_alive(id) || self.is_enabled(id) == value {
                return;
            }
        }
        self.node_mut(id).flags.set(NodeFlags::ENABLED, value);
        self.broadcast_change(id, EventType::EnabledChange, PropertyValue::Bool(value));
    }

    /// Set the node's own `visible` flag, broadcasting `visiblechange` to the
    /// subtree on change.
    pub fn set_visible(&mut self, id: NodeId, value: bool) {
        if !self.is_alive(id) || self.is_visible(id) == value {
            return;
        }
        self.node_mut(id).flags.set(NodeFlags::VISIBLE, value);
        self.broadcast_change(id, EventType::VisibleChange, PropertyValue::Bool(value));
    }

    fn set_plain_flag(&mut self, id: NodeId, flag: NodeFlags, value: bool) {
        if let Some(n) = self.node_opt_mut(id) {
            n.flags.set(flag, value);
        }
    }

    /// Set whether the node can receive focus.
    ///
    /// Scene roots are never focusable.
    pub fn set_focusable(&mut self, id: NodeId, value: bool) {
        if !self.is_scene_root(id) {
            self.set_plain_flag(id, NodeFlags::FOCUSABLE, value);
        }
    }

    /// Set whether the node can be dragged.
    pub fn set_draggable(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::DRAGGABLE, value);
    }

    /// Set whether the node searches for drop targets while dragged.
    pub fn set_find_drop_target(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::FIND_DROP_TARGET, value);
    }

    /// Set whether the node and its subtree can be intercepted by the main raycaster.
    pub fn set_intercept_by_raycaster(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::INTERCEPT_BY_RAYCASTER, value);
    }

    /// Interaction layer: mark the node as taking part in pointer interaction.
    pub fn set_interactable(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::INTERACTABLE, value);
    }

    /// Interaction layer: record whether the primary pointer is over the node.
    pub fn set_hovered(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::HOVERED, value);
    }

    /// Interaction layer: record whether a press on the node is in progress.
    pub fn set_clicking(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::CLICKING, value);
    }

    /// Interaction layer: record whether the node is being dragged.
    pub fn set_dragging(&mut self, id: NodeId, value: bool) {
        self.set_plain_flag(id, NodeFlags::DRAGGING, value);
    }

    /// The node dragged in place of this one, if any.
    pub fn drag_target(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.drag_target)
    }

    /// Drag `target` instead of `id` when `id` is dragged.
    pub fn set_drag_target(&mut self, id: NodeId, target: Option<NodeId>) {
        if let Some(n) = self.node_opt_mut(id) {
            n.drag_target = target;
        }
    }

    /// The node's local transform.
    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.node_opt(id).map(|n| &n.transform)
    }

    /// Set the position, emitting `positionchange` if the node asked for it.
    pub fn set_position(&mut self, id: NodeId, position: Vec3) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if n.transform.position == position {
            return;
        }
        n.transform.position = position;
        if n.instrumented.contains(Instrumented::POSITION) {
            self.broadcast_change(id, EventType::PositionChange, PropertyValue::Vec3(position));
        }
    }

    /// Set the scale, emitting `scalechange` if the node asked for it.
    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if n.transform.scale == scale {
            return;
        }
        n.transform.scale = scale;
        if n.instrumented.contains(Instrumented::SCALE) {
            self.broadcast_change(id, EventType::ScaleChange, PropertyValue::Vec3(scale));
        }
    }

    /// Set the Euler angles (XYZ, radians). The quaternion follows; a single
    /// `rotationchange` is emitted if the node asked for it.
    pub fn set_rotation(&mut self, id: NodeId, rotation: Vec3) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if n.transform.rotation == rotation {
            return;
        }
        n.transform.apply_rotation(rotation);
        let quaternion = n.transform.quaternion;
        if n.instrumented.contains(Instrumented::ROTATION) {
            self.broadcast_change(id, EventType::RotationChange, PropertyValue::Quat(quaternion));
        }
    }

    /// Set the quaternion. The Euler angles follow; a single `rotationchange` is
    /// emitted if the node asked for it.
    pub fn set_quaternion(&mut self, id: NodeId, quaternion: Quat) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if n.transform.quaternion == quaternion {
            return;
        }
        n.transform.apply_quaternion(quaternion);
        if n.instrumented.contains(Instrumented::ROTATION) {
            self.broadcast_change(id, EventType::RotationChange, PropertyValue::Quat(quaternion));
        }
    }

    fn broadcast_change(&mut self, id: NodeId, ty: EventType, value: PropertyValue) {
        let mut event = Event::Update(UpdateEvent::PropertyChange(PropertyChange {
            value,
            target: id,
        }));
        self.dispatch_broadcast(id, ty, &mut event);
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node<I> {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<I> {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node<I>> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node<I>> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }
}
