// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatch algorithms: at-target, bubbling, direct, and subtree broadcast.
//!
//! ## Delivery
//!
//! Every algorithm delivers to one node at a time. Delivery snapshots the
//! node's listeners for the type, then walks the snapshot in order:
//!
//! - stop as soon as the event's stop-immediate flag is set,
//! - skip listeners that were removed since the snapshot was taken,
//! - call the rest with `(tree, node, event)`.
//!
//! Listeners added during delivery do not run in the same pass. A node without
//! listeners for the type is simply passed over.
//!
//! ## Bubbling
//!
//! Bubbling climbs from the target through its ancestors while `bubbles` holds.
//! Each hop re-reads the node's parent after its listeners ran, so a listener
//! that reparents the node changes the rest of the path. The stop-immediate flag
//! is cleared before each hop; it only silences the node it was set at.

use core::mem;

use crate::event::{Event, InteractionEvent};
use crate::index::RegistrationIndex;
use crate::tree::Tree;
use crate::types::{EventType, NodeId, PropagationClass};

impl<I: RegistrationIndex> Tree<I> {
    /// Deliver an interaction event to `node`'s own listeners.
    ///
    /// Sets `ty`, `target`, and `current_target`, clears `bubbles`,
    /// `default_prevented`, and the stop-immediate flag first. The event is
    /// returned through `event` so the caller can inspect `default_prevented`.
    pub fn dispatch_at_target(
        &mut self,
        node: NodeId,
        ty: EventType,
        event: &mut InteractionEvent,
    ) {
        event.reset_for_dispatch(ty, node, false);
        self.with_wrapped(event, |tree, ev| tree.deliver(node, ty, ev));
    }

    /// Deliver an interaction event to `node`, then to each ancestor while the
    /// event keeps bubbling.
    ///
    /// ```
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use understory_scene_events::{EventType, InteractionEvent, Listener, Transform, Tree};
    ///
    /// let mut tree = Tree::new();
    /// let scene = tree.insert_scene(Default::default());
    /// let button = tree.insert(Some(scene), Transform::default());
    /// let icon = tree.insert(Some(button), Transform::default());
    ///
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    /// let log = seen.clone();
    /// tree.on(button, EventType::Click, Listener::new(move |_, node, ev| {
    ///     log.borrow_mut().push(node);
    ///     ev.as_interaction_mut().unwrap().stop_propagation();
    /// }));
    ///
    /// let mut click = InteractionEvent::new(0.0);
    /// tree.dispatch_with_bubbling(icon, EventType::Click, &mut click);
    /// assert_eq!(*seen.borrow(), [button]);
    /// assert_eq!(click.target(), Some(icon));
    /// assert!(!click.bubbles());
    /// ```
    pub fn dispatch_with_bubbling(
        &mut self,
        node: NodeId,
        ty: EventType,
        event: &mut InteractionEvent,
    ) {
        event.reset_for_dispatch(ty, node, true);
        self.with_wrapped(event, |tree, ev| tree.bubble(node, ty, ev));
    }

    /// Deliver `event` to `node`'s listeners only, without touching its fields.
    pub fn dispatch_direct(&mut self, node: NodeId, ty: EventType, event: &mut Event) {
        self.deliver(node, ty, event);
    }

    /// Deliver `event` to `node` and then to every descendant, pre-order.
    ///
    /// Children are snapshotted per node before recursing into them. Children
    /// removed from the tree during the broadcast are skipped. Enabled and
    /// visible state are ignored.
    pub fn dispatch_broadcast(&mut self, node: NodeId, ty: EventType, event: &mut Event) {
        if !self.is_alive(node) {
            return;
        }
        self.deliver(node, ty, event);
        let children = self.children_of(node).to_vec();
        for child in children {
            // Skip children a listener moved out of this subtree.
            if self.parent_of(child) == Some(node) {
                self.dispatch_broadcast(child, ty, event);
            }
        }
    }

    /// Dispatch an event on `node` the way its type is meant to travel, without
    /// climbing.
    ///
    /// Interaction types go through [`Tree::dispatch_at_target`]; misc and
    /// broadcast types are delivered to `node` only. The event is handed back.
    pub fn trigger(&mut self, node: NodeId, ty: EventType, mut event: Event) -> Event {
        if ty.class() == PropagationClass::Interaction {
            if let Event::Interaction(e) = &mut event {
                self.dispatch_at_target(node, ty, e);
                return event;
            }
            tracing::debug!(?node, %ty, "interaction type triggered with an update payload");
        }
        self.deliver(node, ty, &mut event);
        event
    }

    /// Dispatch an interaction event on `node` and its ancestors.
    ///
    /// Only interaction types paired with an [`InteractionEvent`] travel; anything
    /// else is handed back untouched.
    pub fn trigger_ancestor(&mut self, node: NodeId, ty: EventType, mut event: Event) -> Event {
        if ty.class() == PropagationClass::Interaction
            && let Event::Interaction(e) = &mut event
        {
            self.dispatch_with_bubbling(node, ty, e);
        }
        event
    }

    fn bubble(&mut self, node: NodeId, ty: EventType, event: &mut Event) {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.is_alive(id) {
                break;
            }
            let Some(e) = event.as_interaction_mut() else {
                break;
            };
            if !e.bubbles {
                break;
            }
            e.current_target = Some(id);
            e.stopped_immediate = false;
            self.deliver(id, ty, event);
            current = self.parent_of(id);
        }
    }

    fn deliver(&mut self, node: NodeId, ty: EventType, event: &mut Event) {
        let entries = self.listener_snapshot(node, ty);
        for entry in entries {
            if event.immediate_propagation_stopped() || !self.is_alive(node) {
                break;
            }
            if entry.is_attached() {
                entry.listener.call(self, node, event);
            }
        }
    }

    /// Run `f` with `event` moved into an [`Event`], then move it back.
    fn with_wrapped(
        &mut self,
        event: &mut InteractionEvent,
        f: impl FnOnce(&mut Self, &mut Event),
    ) {
        let mut wrapped = Event::Interaction(mem::take(event));
        f(self, &mut wrapped);
        match wrapped {
            Event::Interaction(e) => *event = e,
            Event::Update(_) => {
                tracing::debug!("listener replaced an interaction event with an update event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AnimateEvent, UpdateEvent};
    use crate::registry::Listener;
    use crate::scene::SceneConfig;
    use crate::types::Transform;
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    type Log = Rc<RefCell<Vec<(NodeId, &'static str)>>>;

    fn record(log: &Log, tag: &'static str) -> Listener {
        let log = log.clone();
        Listener::new(move |_, node, _| log.borrow_mut().push((node, tag)))
    }

    fn chain() -> (Tree, [NodeId; 4]) {
        let mut tree = Tree::new();
        let root = tree.insert_scene(SceneConfig::default());
        let a = tree.insert(Some(root), Transform::default());
        let b = tree.insert(Some(a), Transform::default());
        let c = tree.insert(Some(b), Transform::default());
        (tree, [root, a, b, c])
    }

    #[test]
    fn bubbling_stops_after_stop_propagation() {
        let (mut tree, [root, a, b, c]) = chain();
        let log = Log::default();
        for (n, tag) in [(root, "root"), (b, "b"), (c, "c")] {
            tree.on(n, EventType::PointerDown, record(&log, tag));
        }
        let stopper = {
            let log = log.clone();
            Listener::new(move |_, node, ev: &mut Event| {
                log.borrow_mut().push((node, "a"));
                ev.as_interaction_mut().unwrap().stop_propagation();
            })
        };
        tree.on(a, EventType::PointerDown, stopper);

        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_with_bubbling(c, EventType::PointerDown, &mut ev);
        assert_eq!(*log.borrow(), vec![(c, "c"), (b, "b"), (a, "a")]);
        assert_eq!(ev.target(), Some(c));
        assert_eq!(ev.current_target(), Some(a));
        assert_eq!(ev.ty(), Some(EventType::PointerDown));
    }

    #[test]
    fn current_target_tracks_each_hop() {
        let (mut tree, [root, a, b, c]) = chain();
        let seen = Rc::new(RefCell::new(vec![]));
        let l = {
            let seen = seen.clone();
            Listener::new(move |_, node, ev: &mut Event| {
                let e = ev.as_interaction().unwrap();
                seen.borrow_mut().push((node, e.target(), e.current_target()));
            })
        };
        for n in [root, a, b, c] {
            tree.on(n, EventType::Click, l.clone());
        }
        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_with_bubbling(b, EventType::Click, &mut ev);
        assert_eq!(
            *seen.borrow(),
            vec![
                (b, Some(b), Some(b)),
                (a, Some(b), Some(a)),
                (root, Some(b), Some(root)),
            ]
        );
    }

    #[test]
    fn stop_immediate_only_silences_the_current_node() {
        let (mut tree, [_, a, b, _]) = chain();
        let log = Log::default();
        let first = {
            let log = log.clone();
            Listener::new(move |_, node, ev: &mut Event| {
                log.borrow_mut().push((node, "first"));
                ev.as_interaction_mut().unwrap().stop_immediate_propagation();
            })
        };
        tree.on(b, EventType::KeyDown, first);
        tree.on(b, EventType::KeyDown, record(&log, "second"));
        tree.on(a, EventType::KeyDown, record(&log, "parent"));

        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_with_bubbling(b, EventType::KeyDown, &mut ev);
        assert_eq!(*log.borrow(), vec![(b, "first"), (a, "parent")]);
    }

    #[test]
    fn at_target_does_not_climb_and_resets_flags() {
        let (mut tree, [_, a, b, _]) = chain();
        let log = Log::default();
        tree.on(a, EventType::Click, record(&log, "a"));
        let prevent = Listener::new(|_, _, ev: &mut Event| {
            ev.as_interaction_mut().unwrap().prevent_default();
        });
        tree.on(b, EventType::Click, prevent);

        let mut ev = InteractionEvent::new(0.0).with_cancelable(true);
        ev.stop_immediate_propagation();
        tree.dispatch_at_target(b, EventType::Click, &mut ev);
        assert!(log.borrow().is_empty());
        assert!(ev.default_prevented());
        assert!(!ev.bubbles());

        // The flag is cleared by the next dispatch.
        tree.dispatch_at_target(a, EventType::Click, &mut ev);
        assert!(!ev.default_prevented());
        assert_eq!(*log.borrow(), vec![(a, "a")]);
    }

    #[test]
    fn nodes_without_listeners_are_passed_over() {
        let (mut tree, [root, _, _, c]) = chain();
        let log = Log::default();
        tree.on(root, EventType::Wheel, record(&log, "root"));
        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_with_bubbling(c, EventType::Wheel, &mut ev);
        assert_eq!(*log.borrow(), vec![(root, "root")]);
    }

    #[test]
    fn broadcast_is_preorder() {
        let mut tree = Tree::new();
        let root = tree.insert_scene(SceneConfig::default());
        let a = tree.insert(Some(root), Transform::default());
        let b = tree.insert(Some(root), Transform::default());
        let c = tree.insert(Some(b), Transform::default());
        let log = Log::default();
        for n in [c, b, a, root] {
            tree.on(n, EventType::VisibleChange, record(&log, "v"));
        }
        let mut ev = Event::Interaction(InteractionEvent::new(0.0));
        tree.dispatch_broadcast(root, EventType::VisibleChange, &mut ev);
        let order: Vec<NodeId> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec![root, a, b, c]);
    }

    #[test]
    fn broadcast_skips_children_removed_mid_flight() {
        let mut tree = Tree::new();
        let root = tree.insert_scene(SceneConfig::default());
        let a = tree.insert(Some(root), Transform::default());
        let b = tree.insert(Some(root), Transform::default());
        let log = Log::default();
        let remover = {
            let log = log.clone();
            Listener::new(move |tree: &mut Tree, node, _| {
                log.borrow_mut().push((node, "a"));
                tree.remove(b);
            })
        };
        tree.on(a, EventType::EnabledChange, remover);
        tree.on(b, EventType::EnabledChange, record(&log, "b"));
        let mut ev = Event::Update(UpdateEvent::Animate(AnimateEvent {
            delta: 0.0,
            total: 0.0,
        }));
        tree.dispatch_broadcast(root, EventType::EnabledChange, &mut ev);
        assert_eq!(*log.borrow(), vec![(a, "a")]);
    }

    #[test]
    fn broadcast_skips_children_moved_out_of_the_subtree() {
        let mut tree = Tree::new();
        let root = tree.insert_scene(SceneConfig::default());
        let a = tree.insert(Some(root), Transform::default());
        let b = tree.insert(Some(a), Transform::default());
        let c = tree.insert(Some(a), Transform::default());
        let elsewhere = tree.insert(Some(root), Transform::default());
        let log = Log::default();
        let mover = {
            let log = log.clone();
            Listener::new(move |tree: &mut Tree, node, _| {
                log.borrow_mut().push((node, "a"));
                tree.append(elsewhere, b);
                tree.detach(c);
            })
        };
        tree.on(a, EventType::EnabledChange, mover);
        tree.on(b, EventType::EnabledChange, record(&log, "b"));
        tree.on(c, EventType::EnabledChange, record(&log, "c"));
        let mut ev = Event::Update(UpdateEvent::Animate(AnimateEvent {
            delta: 0.0,
            total: 0.0,
        }));
        tree.dispatch_broadcast(a, EventType::EnabledChange, &mut ev);
        assert_eq!(*log.borrow(), vec![(a, "a")]);
        assert_eq!(tree.parent_of(b), Some(elsewhere));
    }

    #[test]
    fn listener_removed_and_readded_waits_for_the_next_pass() {
        let (mut tree, [_, a, _, _]) = chain();
        let log = Log::default();
        let third = record(&log, "third");
        let first = {
            let log = log.clone();
            let third = third.clone();
            Listener::new(move |tree: &mut Tree, node, _| {
                log.borrow_mut().push((node, "first"));
                tree.off(node, EventType::Click, &third);
                tree.on(node, EventType::Click, third.clone());
            })
        };
        tree.on(a, EventType::Click, first);
        tree.on(a, EventType::Click, record(&log, "second"));
        tree.on(a, EventType::Click, third.clone());

        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_at_target(a, EventType::Click, &mut ev);
        assert_eq!(*log.borrow(), vec![(a, "first"), (a, "second")]);
        assert!(tree.has_listener(a, EventType::Click, &third));
        assert_eq!(tree.listener_count(a, EventType::Click), 3);
    }

    #[test]
    fn listener_removing_its_own_node_silences_the_rest() {
        let (mut tree, [_, a, _, _]) = chain();
        let log = Log::default();
        let first = {
            let log = log.clone();
            Listener::new(move |tree: &mut Tree, node, _| {
                log.borrow_mut().push((node, "first"));
                tree.remove(node);
            })
        };
        tree.on(a, EventType::Click, first);
        tree.on(a, EventType::Click, record(&log, "second"));

        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_at_target(a, EventType::Click, &mut ev);
        assert_eq!(*log.borrow(), vec![(a, "first")]);
    }

    #[test]
    fn snapshot_semantics_under_mutation() {
        let (mut tree, [_, a, _, _]) = chain();
        let log = Log::default();
        let late = record(&log, "late");
        let third = record(&log, "third");
        let first = {
            let log = log.clone();
            let late = late.clone();
            let third = third.clone();
            Listener::new(move |tree: &mut Tree, node, _| {
                log.borrow_mut().push((node, "first"));
                tree.on(node, EventType::Click, late.clone());
                tree.off(node, EventType::Click, &third);
            })
        };
        tree.on(a, EventType::Click, first);
        tree.on(a, EventType::Click, record(&log, "second"));
        tree.on(a, EventType::Click, third);

        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_at_target(a, EventType::Click, &mut ev);
        assert_eq!(*log.borrow(), vec![(a, "first"), (a, "second")]);

        log.borrow_mut().clear();
        tree.dispatch_at_target(a, EventType::Click, &mut ev);
        assert_eq!(
            *log.borrow(),
            vec![(a, "first"), (a, "second"), (a, "late")]
        );
    }

    #[test]
    fn bubbling_follows_reparenting_from_a_drop_listener() {
        let mut tree = Tree::new();
        let scene = tree.insert_scene(SceneConfig::default());
        let shelf = tree.insert(Some(scene), Transform::default());
        let bin = tree.insert(Some(scene), Transform::default());
        let item = tree.insert(Some(shelf), Transform::default());
        let log = Log::default();

        let mover = {
            let log = log.clone();
            Listener::new(move |tree: &mut Tree, node, _| {
                log.borrow_mut().push((node, "item"));
                tree.append(bin, node);
            })
        };
        tree.on(item, EventType::Drop, mover);
        tree.on(shelf, EventType::Drop, record(&log, "shelf"));
        tree.on(bin, EventType::Drop, record(&log, "bin"));

        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_with_bubbling(item, EventType::Drop, &mut ev);
        assert_eq!(*log.borrow(), vec![(item, "item"), (bin, "bin")]);
        assert_eq!(tree.parent_of(item), Some(bin));
        assert_eq!(tree.scene_of(item), Some(scene));
    }

    #[test]
    fn bubbling_stops_when_the_node_is_removed() {
        let (mut tree, [root, a, b, _]) = chain();
        let log = Log::default();
        tree.on(
            b,
            EventType::PointerUp,
            Listener::new(|tree: &mut Tree, node, _| tree.remove(node)),
        );
        tree.on(a, EventType::PointerUp, record(&log, "a"));
        tree.on(root, EventType::PointerUp, record(&log, "root"));
        let mut ev = InteractionEvent::new(0.0);
        tree.dispatch_with_bubbling(b, EventType::PointerUp, &mut ev);
        assert!(log.borrow().is_empty());
        assert!(!tree.is_alive(b));
    }

    #[test]
    fn trigger_routes_by_class() {
        let (mut tree, [_, a, b, _]) = chain();
        let log = Log::default();
        for n in [a, b] {
            tree.on(n, EventType::Click, record(&log, "click"));
            tree.on(n, EventType::Animate, record(&log, "animate"));
            tree.on(n, EventType::EnabledChange, record(&log, "enabled"));
        }

        let ev = tree.trigger(b, EventType::Click, InteractionEvent::new(1.0).into());
        assert_eq!(*log.borrow(), vec![(b, "click")]);
        let e = ev.as_interaction().unwrap();
        assert_eq!(e.target(), Some(b));
        assert!(!e.bubbles());

        log.borrow_mut().clear();
        let anim = UpdateEvent::Animate(AnimateEvent {
            delta: 16.0,
            total: 16.0,
        });
        tree.trigger(b, EventType::Animate, anim.clone().into());
        tree.trigger(b, EventType::EnabledChange, anim.clone().into());
        assert_eq!(*log.borrow(), vec![(b, "animate"), (b, "enabled")]);

        // Mis-tagged payloads are still delivered, once, at the node.
        log.borrow_mut().clear();
        tree.trigger(b, EventType::Click, anim.into());
        assert_eq!(*log.borrow(), vec![(b, "click")]);
    }

    #[test]
    fn trigger_ancestor_only_bubbles_interactions() {
        let (mut tree, [root, a, b, _]) = chain();
        let log = Log::default();
        for n in [a, b] {
            tree.on(n, EventType::KeyUp, record(&log, "key"));
            tree.on(n, EventType::Animate, record(&log, "animate"));
        }
        let ev = tree.trigger_ancestor(b, EventType::KeyUp, InteractionEvent::new(0.0).into());
        assert_eq!(*log.borrow(), vec![(b, "key"), (a, "key")]);
        // Listener-less ancestors are still visited.
        assert_eq!(ev.as_interaction().and_then(|e| e.current_target()), Some(root));

        log.borrow_mut().clear();
        let anim = UpdateEvent::Animate(AnimateEvent {
            delta: 1.0,
            total: 1.0,
        });
        tree.trigger_ancestor(b, EventType::Animate, anim.into());
        tree.trigger_ancestor(b, EventType::Animate, InteractionEvent::new(0.0).into());
        assert!(log.borrow().is_empty());
    }
}
