// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Scene Events: DOM-style event dispatch over a 3D scene tree.
//!
//! This crate owns a tree of scene nodes and delivers events to listeners attached to
//! those nodes. It is the part of an interaction stack that sits between hit testing
//! (which decides *which* node an input lands on) and application code (which reacts).
//!
//! - Listeners are registered per node and event type, and compared by identity.
//! - Interaction events (pointer, keyboard, drag/drop, focus) are delivered at the target
//!   or bubble through ancestors, with `stop_propagation`, `stop_immediate_propagation`,
//!   and `prevent_default`.
//! - Property-change events (`enabledchange`, `visiblechange`, transform changes) are
//!   broadcast to the whole subtree of the changed node.
//! - Each scene root holds one focused node; focus transitions fire
//!   `blur`/`focusout`/`focus`/`focusin` with related targets.
//! - A [`RegistrationIndex`] learns which nodes of each scene listen to which types, so
//!   per-frame work only visits interested nodes.
//!
//! Listeners get `&mut Tree` and may change anything, including the structure being
//! dispatched over. Each delivery snapshots the listener list, and bubbling re-reads the
//! parent link after every hop.
//!
//! ## Not a hit tester
//!
//! This crate does not raycast, track pointers, or synthesize clicks and drags from raw
//! input. The interaction layer above it computes [`Intersection`]s, decides which events
//! to emit, and calls the dispatch entry points. The flags it maintains while doing so
//! (hovered, clicking, dragging) are stored here so listeners can read them.
//!
//! ## API overview
//!
//! - [`Tree`]: node storage, structure edits, flags, transforms, dispatch, and focus.
//! - [`Listener`]: shared, identity-compared callback handle.
//! - [`Event`]: [`InteractionEvent`] or [`UpdateEvent`], handed to listeners.
//! - [`EventType`]: the closed set of event types, each with a [`PropagationClass`].
//! - [`SceneIndex`]: default [`RegistrationIndex`]; [`NoIndex`] records nothing.
//!
//! Key operations:
//! - [`Tree::insert_scene`] / [`Tree::insert`] / [`Tree::append`] / [`Tree::detach`] / [`Tree::remove`]
//! - [`Tree::on`] / [`Tree::off`] / [`Tree::has_listener`]
//! - [`Tree::dispatch_at_target`] / [`Tree::dispatch_with_bubbling`] /
//!   [`Tree::dispatch_broadcast`] / [`Tree::dispatch_direct`]
//! - [`Tree::trigger`] / [`Tree::trigger_ancestor`] for manual dispatch routed by type.
//! - [`Tree::focus`] / [`Tree::blur_if_focused`]
//! - [`Tree::set_enabled`] / [`Tree::set_visible`] and the transform setters.
//! - [`Tree::animate`] / [`Tree::resize_viewport`] fan out frame events through the index.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_scene_events::{
//!     Event, EventType, InteractionEvent, Listener, Transform, Tree,
//! };
//!
//! let mut tree = Tree::new();
//! let scene = tree.insert_scene(Default::default());
//! let panel = tree.insert(Some(scene), Transform::default());
//! let button = tree.insert(Some(panel), Transform::default());
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let record = {
//!     let log = log.clone();
//!     Listener::new(move |_, node, ev: &mut Event| {
//!         log.borrow_mut().push((node, ev.as_interaction().unwrap().ty()));
//!     })
//! };
//! tree.on(panel, EventType::Click, record.clone());
//! tree.on(button, EventType::Click, record.clone());
//!
//! // A click bubbles from the button to the panel.
//! let mut click = InteractionEvent::new(0.0);
//! tree.dispatch_with_bubbling(button, EventType::Click, &mut click);
//! assert_eq!(
//!     *log.borrow(),
//!     [(button, Some(EventType::Click)), (panel, Some(EventType::Click))]
//! );
//!
//! // Disabling the focused node clears its scene's focus.
//! tree.focus(scene, Some(button));
//! assert!(tree.is_focused(button));
//! tree.set_enabled(button, false);
//! assert_eq!(tree.focused(scene), None);
//!
//! // Enabled state is inherited.
//! tree.set_enabled(panel, false);
//! tree.set_enabled(button, true);
//! assert!(!tree.enabled_state(button));
//! ```
//!
//! ## Features
//!
//! - `std` (default): forwards to `kurbo`, `glam`, and `tracing`.
//! - `libm`: `no_std` math for `kurbo` and `glam`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod dispatch;
mod event;
mod focus;
mod index;
mod registry;
mod scene;
mod tree;
mod types;

pub use event::{
    AnimateEvent, DataTransfer, DragEvent, Event, InteractionEvent, InteractionPayload,
    Intersection, KeyInput, Modifiers, PointerEvent, PointerInput, PointerKind, PropertyChange,
    PropertyValue, UpdateEvent, ViewportResizeEvent,
};
pub use index::{NoIndex, RegistrationIndex, SceneIndex};
pub use registry::Listener;
pub use scene::SceneConfig;
pub use tree::Tree;
pub use types::{
    EventType, InteractionDefaults, Instrumented, NodeFlags, NodeId, PropagationClass, Transform,
};
