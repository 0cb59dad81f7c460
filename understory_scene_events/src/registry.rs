// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node listener registry and the listener API on [`Tree`].

use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::event::Event;
use crate::index::{RegistrationIndex, SceneIndex};
use crate::tree::Tree;
use crate::types::{EventType, Instrumented, NodeFlags, NodeId};

type Callback<I> = dyn Fn(&mut Tree<I>, NodeId, &mut Event);

/// A shared handle to a listener callback.
///
/// Handles compare by identity: two clones of the same handle are equal, two
/// handles built from identical closures are not. [`Tree::on`] returns the handle
/// it was given so the same value can be passed to [`Tree::off`] later.
///
/// Callbacks receive the tree, the node whose listeners are running, and the event.
pub struct Listener<I = SceneIndex> {
    callback: Rc<Callback<I>>,
}

impl<I> Listener<I> {
    /// Wrap a callback.
    pub fn new(callback: impl Fn(&mut Tree<I>, NodeId, &mut Event) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Whether `self` and `other` are the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(&other.callback))
    }

    pub(crate) fn call(&self, tree: &mut Tree<I>, node: NodeId, event: &mut Event) {
        (self.callback)(tree, node, event);
    }
}

impl<I> Clone for Listener<I> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<I> PartialEq for Listener<I> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<I> Eq for Listener<I> {}

impl<I> fmt::Debug for Listener<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// One registration of a listener.
///
/// `attached` is shared with every delivery snapshot taken while the entry is
/// registered and flips to `false` when the entry is removed. Adding the same
/// handle again creates a new entry, so snapshots holding the old one stay
/// detached.
pub(crate) struct Entry<I> {
    pub(crate) listener: Listener<I>,
    attached: Rc<Cell<bool>>,
}

impl<I> Entry<I> {
    fn new(listener: Listener<I>) -> Self {
        Self {
            listener,
            attached: Rc::new(Cell::new(true)),
        }
    }

    /// Whether this registration is still in its list.
    pub(crate) fn is_attached(&self) -> bool {
        self.attached.get()
    }
}

impl<I> Clone for Entry<I> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            attached: Rc::clone(&self.attached),
        }
    }
}

/// Listeners of one node, keyed by event type.
///
/// A type's entry is created on the first request for that type and kept even
/// after its last listener is removed, which is what makes the first-request
/// hooks run once per node and type.
pub(crate) struct Registry<I> {
    lists: HashMap<EventType, SmallVec<[Entry<I>; 2]>>,
}

impl<I> fmt::Debug for Registry<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.lists.iter().map(|(ty, list)| (ty, list.len())))
            .finish()
    }
}

/// What an insertion changed.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Inserted {
    /// First request ever for this type on this node.
    pub(crate) first_request: bool,
    /// The type's list went from empty to non-empty.
    pub(crate) activated: bool,
}

impl<I> Registry<I> {
    pub(crate) fn new() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, ty: EventType, listener: &Listener<I>) -> Inserted {
        let first_request = !self.lists.contains_key(&ty);
        let list = self.lists.entry(ty).or_default();
        let activated = list.is_empty();
        if !list.iter().any(|e| e.listener.ptr_eq(listener)) {
            list.push(Entry::new(listener.clone()));
        }
        Inserted {
            first_request,
            activated,
        }
    }

    pub(crate) fn contains(&self, ty: EventType, listener: &Listener<I>) -> bool {
        self.lists
            .get(&ty)
            .is_some_and(|list| list.iter().any(|e| e.listener.ptr_eq(listener)))
    }

    /// Remove `listener`; returns `Some(emptied)` if it was present.
    pub(crate) fn remove(&mut self, ty: EventType, listener: &Listener<I>) -> Option<bool> {
        let list = self.lists.get_mut(&ty)?;
        let pos = list.iter().position(|e| e.listener.ptr_eq(listener))?;
        list.remove(pos).attached.set(false);
        Some(list.is_empty())
    }

    pub(crate) fn listens(&self, ty: EventType) -> bool {
        self.lists.get(&ty).is_some_and(|list| !list.is_empty())
    }

    pub(crate) fn listener_count(&self, ty: EventType) -> usize {
        self.lists.get(&ty).map_or(0, |list| list.len())
    }

    /// Registrations of `ty` in insertion order, as of now.
    pub(crate) fn snapshot(&self, ty: EventType) -> SmallVec<[Entry<I>; 4]> {
        self.lists
            .get(&ty)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Types with at least one listener, sorted.
    pub(crate) fn active_types(&self) -> SmallVec<[EventType; 8]> {
        let mut types: SmallVec<[EventType; 8]> = self
            .lists
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(ty, _)| *ty)
            .collect();
        types.sort_unstable();
        types
    }

    pub(crate) fn is_drop_target(&self) -> bool {
        EventType::DROP_TARGET_TYPES
            .iter()
            .any(|&ty| self.listens(ty))
    }
}

impl<I: RegistrationIndex> Tree<I> {
    /// Attach `listener` to `node` for events of type `ty`.
    ///
    /// Adding the same handle twice for the same type registers it once. The first
    /// request for a type on a node runs that type's one-time hook: change
    /// notifications for `positionchange`, `scalechange`, `rotationchange`, and
    /// `visiblechange` are switched on for the node. Drag-target types mark the
    /// node as a drop target. While the node belongs to a scene, the registration
    /// index is told when the node starts listening to `ty`.
    ///
    /// Returns `listener` so it can be kept for [`Tree::off`]. Stale ids are ignored.
    ///
    /// ```
    /// use understory_scene_events::{EventType, Listener, Transform, Tree};
    ///
    /// let mut tree = Tree::new();
    /// let scene = tree.insert_scene(Default::default());
    /// let node = tree.insert(Some(scene), Transform::default());
    ///
    /// let listener = tree.on(node, EventType::Drop, Listener::new(|_, _, _| {}));
    /// assert!(tree.has_listener(node, EventType::Drop, &listener));
    /// assert!(tree.is_drop_target(node));
    /// assert_eq!(tree.index().nodes(scene, EventType::Drop), &[node]);
    ///
    /// tree.off(node, EventType::Drop, &listener);
    /// assert!(!tree.is_drop_target(node));
    /// assert!(tree.index().nodes(scene, EventType::Drop).is_empty());
    /// ```
    pub fn on(&mut self, node: NodeId, ty: EventType, listener: Listener<I>) -> Listener<I> {
        let Some(n) = self.node_opt_mut(node) else {
            return listener;
        };
        let inserted = n.registry.get_or_insert_with(Registry::new).insert(ty, &listener);

        if inserted.first_request
            && let Some(bit) = Instrumented::for_type(ty)
        {
            tracing::trace!(?node, %ty, "instrumenting node for change notifications");
            n.instrumented |= bit;
        }
        if ty.is_drop_target_type() {
            n.flags.insert(NodeFlags::DROP_TARGET);
        }
        let scene = n.scene;
        if inserted.activated
            && let Some(scene) = scene
        {
            self.index.register(scene, ty, node);
        }
        listener
    }

    /// Attach one listener to several event types.
    pub fn on_many(
        &mut self,
        node: NodeId,
        types: &[EventType],
        listener: Listener<I>,
    ) -> Listener<I> {
        for &ty in types {
            self.on(node, ty, listener.clone());
        }
        listener
    }

    /// Whether `listener` is attached to `node` for `ty`.
    pub fn has_listener(&self, node: NodeId, ty: EventType, listener: &Listener<I>) -> bool {
        self.node_opt(node)
            .and_then(|n| n.registry.as_ref())
            .is_some_and(|r| r.contains(ty, listener))
    }

    /// Whether `node` has at least one listener for `ty`.
    pub fn listens_to(&self, node: NodeId, ty: EventType) -> bool {
        self.node_opt(node)
            .and_then(|n| n.registry.as_ref())
            .is_some_and(|r| r.listens(ty))
    }

    /// Number of listeners `node` has for `ty`.
    pub fn listener_count(&self, node: NodeId, ty: EventType) -> usize {
        self.node_opt(node)
            .and_then(|n| n.registry.as_ref())
            .map_or(0, |r| r.listener_count(ty))
    }

    /// Detach `listener` from `node` for `ty`.
    ///
    /// Removing a listener that is not attached does nothing. When the last
    /// listener of `ty` goes away the node is unregistered from the index, and
    /// the drop-target flag is recomputed for drag-target types.
    pub fn off(&mut self, node: NodeId, ty: EventType, listener: &Listener<I>) {
        let Some(n) = self.node_opt_mut(node) else {
            return;
        };
        let Some(registry) = n.registry.as_mut() else {
            return;
        };
        let Some(emptied) = registry.remove(ty, listener) else {
            return;
        };
        if !emptied {
            return;
        }
        if ty.is_drop_target_type() {
            let drop_target = registry.is_drop_target();
            n.flags.set(NodeFlags::DROP_TARGET, drop_target);
        }
        let scene = n.scene;
        if let Some(scene) = scene {
            self.index.unregister(scene, ty, node);
        }
    }

    pub(crate) fn active_types(&self, node: NodeId) -> SmallVec<[EventType; 8]> {
        self.node_opt(node)
            .and_then(|n| n.registry.as_ref())
            .map(Registry::active_types)
            .unwrap_or_default()
    }

    pub(crate) fn listener_snapshot(&self, node: NodeId, ty: EventType) -> SmallVec<[Entry<I>; 4]> {
        self.node_opt(node)
            .and_then(|n| n.registry.as_ref())
            .map(|r| r.snapshot(ty))
            .unwrap_or_default()
    }
}
