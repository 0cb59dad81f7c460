// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event objects handed to listeners.
//!
//! Every listener receives an [`Event`], which is one of two propagation families:
//!
//! - [`InteractionEvent`]: DOM-like events with `target`, `current_target`, `bubbles`,
//!   `default_prevented`, and stop flags. Payloads describe pointer, drag, focus, and
//!   keyboard input.
//! - [`UpdateEvent`]: property changes and frame notifications. These carry no
//!   propagation state; how far they travel is decided by the event type's
//!   [`PropagationClass`](crate::PropagationClass).
//!
//! Events are built by the caller right before a dispatch call and are never retained
//! by the tree.

use alloc::rc::Rc;
use alloc::string::String;
use core::any::Any;

use glam::{Quat, Vec3};
use hashbrown::HashMap;
use kurbo::{Point, Vec2};

use crate::types::{EventType, NodeId};

/// An event delivered to listeners.
#[derive(Clone, Debug)]
pub enum Event {
    /// Pointer, keyboard, drag/drop, and focus events.
    Interaction(InteractionEvent),
    /// Property-change and frame events.
    Update(UpdateEvent),
}

impl Event {
    /// The interaction event, if this is one.
    pub fn as_interaction(&self) -> Option<&InteractionEvent> {
        match self {
            Self::Interaction(e) => Some(e),
            Self::Update(_) => None,
        }
    }

    /// The interaction event, mutably, if this is one.
    pub fn as_interaction_mut(&mut self) -> Option<&mut InteractionEvent> {
        match self {
            Self::Interaction(e) => Some(e),
            Self::Update(_) => None,
        }
    }

    /// The update event, if this is one.
    pub fn as_update(&self) -> Option<&UpdateEvent> {
        match self {
            Self::Update(e) => Some(e),
            Self::Interaction(_) => None,
        }
    }

    pub(crate) fn immediate_propagation_stopped(&self) -> bool {
        matches!(self, Self::Interaction(e) if e.stopped_immediate)
    }
}

impl From<InteractionEvent> for Event {
    fn from(e: InteractionEvent) -> Self {
        Self::Interaction(e)
    }
}

impl From<UpdateEvent> for Event {
    fn from(e: UpdateEvent) -> Self {
        Self::Update(e)
    }
}

/// A DOM-like event that can bubble through ancestors.
///
/// The dispatcher owns `ty`, `target`, `current_target`, and resets `bubbles`,
/// `default_prevented`, and the stop-immediate flag at the start of each dispatch.
/// Listeners interact with propagation through [`InteractionEvent::stop_propagation`],
/// [`InteractionEvent::stop_immediate_propagation`], and
/// [`InteractionEvent::prevent_default`].
#[derive(Clone, Debug, Default)]
pub struct InteractionEvent {
    pub(crate) ty: Option<EventType>,
    pub(crate) target: Option<NodeId>,
    pub(crate) current_target: Option<NodeId>,
    time_stamp: f64,
    cancelable: bool,
    pub(crate) bubbles: bool,
    pub(crate) default_prevented: bool,
    pub(crate) stopped_immediate: bool,
    /// Type-specific data.
    pub payload: InteractionPayload,
}

impl InteractionEvent {
    /// An event without payload, created at `time_stamp` (milliseconds).
    pub fn new(time_stamp: f64) -> Self {
        Self {
            time_stamp,
            bubbles: true,
            ..Self::default()
        }
    }

    /// A pointer event.
    pub fn pointer(pointer: PointerEvent, time_stamp: f64) -> Self {
        Self::new(time_stamp).with_payload(InteractionPayload::Pointer(pointer))
    }

    /// A per-frame pointer intersection event.
    pub fn pointer_intersection(intersection: Intersection, time_stamp: f64) -> Self {
        Self::new(time_stamp).with_payload(InteractionPayload::PointerIntersection(intersection))
    }

    /// A drag event.
    pub fn drag(drag: DragEvent, time_stamp: f64) -> Self {
        Self::new(time_stamp).with_payload(InteractionPayload::Drag(drag))
    }

    /// A focus event; `related_target` is the node losing or gaining focus on the other side.
    pub fn focus(related_target: Option<NodeId>, time_stamp: f64) -> Self {
        Self::new(time_stamp).with_payload(InteractionPayload::Focus { related_target })
    }

    /// A keyboard event.
    pub fn keyboard(key: KeyInput, time_stamp: f64) -> Self {
        Self::new(time_stamp).with_payload(InteractionPayload::Keyboard(key))
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: InteractionPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Mark the event as cancelable.
    pub fn with_cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    /// The type this event was last dispatched as.
    pub fn ty(&self) -> Option<EventType> {
        self.ty
    }

    /// The node the event was originally dispatched to.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// The node whose listeners are currently running.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    /// Creation time in milliseconds.
    pub fn time_stamp(&self) -> f64 {
        self.time_stamp
    }

    /// Whether the event is cancelable.
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Whether the event will continue to the next ancestor.
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Whether [`InteractionEvent::prevent_default`] was called during the last dispatch.
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Cancel the default action.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Stop climbing after the current node's listeners have run.
    pub fn stop_propagation(&mut self) {
        self.bubbles = false;
    }

    /// Skip the remaining listeners at the current node.
    ///
    /// This does not stop bubbling on its own; call
    /// [`InteractionEvent::stop_propagation`] as well for that.
    pub fn stop_immediate_propagation(&mut self) {
        self.stopped_immediate = true;
    }

    /// The secondary target of pointer, drag, and focus events.
    pub fn related_target(&self) -> Option<NodeId> {
        match &self.payload {
            InteractionPayload::Pointer(p) => p.related_target,
            InteractionPayload::Drag(d) => d.pointer.related_target,
            InteractionPayload::Focus { related_target } => *related_target,
            _ => None,
        }
    }

    /// The intersection carried by pointer, pointer-intersection, and drag events.
    pub fn intersection(&self) -> Option<&Intersection> {
        match &self.payload {
            InteractionPayload::Pointer(p) => p.intersection.as_ref(),
            InteractionPayload::PointerIntersection(i) => Some(i),
            InteractionPayload::Drag(d) => d.pointer.intersection.as_ref(),
            _ => None,
        }
    }

    /// The drag payload, if this is a drag event.
    pub fn drag_data(&self) -> Option<&DragEvent> {
        match &self.payload {
            InteractionPayload::Drag(d) => Some(d),
            _ => None,
        }
    }

    /// The data transfer of a drag event.
    pub fn data_transfer(&self) -> Option<&DataTransfer> {
        self.drag_data().map(|d| &d.data_transfer)
    }

    /// The data transfer of a drag event, mutably.
    pub fn data_transfer_mut(&mut self) -> Option<&mut DataTransfer> {
        match &mut self.payload {
            InteractionPayload::Drag(d) => Some(&mut d.data_transfer),
            _ => None,
        }
    }

    /// The new position of a dragged node.
    pub fn position(&self) -> Option<Vec3> {
        self.drag_data().and_then(|d| d.position)
    }

    /// The raw key input of a keyboard event.
    pub fn key(&self) -> Option<&KeyInput> {
        match &self.payload {
            InteractionPayload::Keyboard(k) => Some(k),
            _ => None,
        }
    }

    pub(crate) fn reset_for_dispatch(&mut self, ty: EventType, target: NodeId, bubbles: bool) {
        self.ty = Some(ty);
        self.target = Some(target);
        self.current_target = Some(target);
        self.bubbles = bubbles;
        self.default_prevented = false;
        self.stopped_immediate = false;
    }
}

/// Payload of an [`InteractionEvent`].
#[derive(Clone, Debug, Default)]
pub enum InteractionPayload {
    /// No payload.
    #[default]
    None,
    /// `pointer*`, `click`, `dblclick`, `wheel`.
    Pointer(PointerEvent),
    /// `pointerintersection`.
    PointerIntersection(Intersection),
    /// `drag*` and `drop`.
    Drag(DragEvent),
    /// `focus`, `blur`, `focusin`, `focusout`.
    Focus {
        /// The node on the other side of the focus transition.
        related_target: Option<NodeId>,
    },
    /// `keydown`, `keyup`.
    Keyboard(KeyInput),
}

/// Pointer event data.
#[derive(Clone, Debug)]
pub struct PointerEvent {
    /// Raw pointer input.
    pub input: PointerInput,
    /// Where the pointer ray met the scene, if it did.
    pub intersection: Option<Intersection>,
    /// The secondary target (for example the node left on `pointerover`).
    pub related_target: Option<NodeId>,
}

/// Drag event data.
#[derive(Clone, Debug)]
pub struct DragEvent {
    /// The pointer data that drove this drag step.
    pub pointer: PointerEvent,
    /// Data carried from the dragged node to drop targets.
    pub data_transfer: DataTransfer,
    /// The new position of the dragged node.
    pub position: Option<Vec3>,
}

/// Result of a ray hitting a node, computed by the host's hit tester.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    /// The node that was hit.
    pub object: NodeId,
    /// Distance from the ray origin.
    pub distance: f32,
    /// Hit point in world space.
    pub point: Vec3,
    /// The hitbox node that was hit, when hitboxes are used.
    pub hitbox: Option<NodeId>,
    /// Instance index for instanced geometry.
    pub instance_id: Option<u32>,
}

/// Kind of pointing device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// A mouse.
    #[default]
    Mouse,
    /// A pen or stylus.
    Pen,
    /// A touch contact.
    Touch,
}

bitflags::bitflags! {
    /// Keyboard modifiers held during an input event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift.
        const SHIFT = 1 << 0;
        /// Control.
        const CTRL  = 1 << 1;
        /// Alt / Option.
        const ALT   = 1 << 2;
        /// Meta / Command / Windows.
        const META  = 1 << 3;
    }
}

/// Raw pointer input as received from the windowing layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerInput {
    /// Pointer identifier.
    pub pointer_id: u32,
    /// Device kind.
    pub kind: PointerKind,
    /// Whether this is the primary pointer.
    pub is_primary: bool,
    /// Position in viewport coordinates.
    pub position: Point,
    /// Button that changed state (`-1` for none).
    pub button: i16,
    /// Bit mask of pressed buttons.
    pub buttons: u16,
    /// Modifiers held.
    pub modifiers: Modifiers,
    /// Scroll delta of wheel events.
    pub wheel_delta: Option<Vec2>,
}

/// Raw key input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyInput {
    /// Logical key value (e.g. `"a"`, `"Enter"`).
    pub key: String,
    /// Physical key code (e.g. `"KeyA"`).
    pub code: String,
    /// Whether the key is auto-repeating.
    pub repeat: bool,
    /// Modifiers held.
    pub modifiers: Modifiers,
}

/// Arbitrary keyed data carried through a drag and drop interaction.
#[derive(Clone, Debug, Default)]
pub struct DataTransfer {
    entries: HashMap<String, Rc<dyn Any>>,
}

impl DataTransfer {
    /// Create an empty data transfer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Any>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Rc::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    /// Whether a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove the value under `key`.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Update event: property changes and frame notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateEvent {
    /// `positionchange`, `scalechange`, `rotationchange`, `enabledchange`, `visiblechange`.
    PropertyChange(PropertyChange),
    /// `beforeanimate`, `animate`, `afteranimate`.
    Animate(AnimateEvent),
    /// `viewportresize`.
    ViewportResize(ViewportResizeEvent),
}

impl UpdateEvent {
    /// The property change, if this is one.
    pub fn property_change(&self) -> Option<&PropertyChange> {
        match self {
            Self::PropertyChange(p) => Some(p),
            _ => None,
        }
    }
}

/// A property of `target` changed to `value`.
///
/// Broadcast events keep `target` set to the node whose property changed while
/// they visit its descendants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyChange {
    /// The new value.
    pub value: PropertyValue,
    /// The node whose property changed.
    pub target: NodeId,
}

/// New value carried by a [`PropertyChange`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    /// `enabled` / `visible`.
    Bool(bool),
    /// `position` / `scale`.
    Vec3(Vec3),
    /// Rotation, as a quaternion.
    Quat(Quat),
}

impl PropertyValue {
    /// The boolean value, if this is one.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }
}

/// Frame timing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimateEvent {
    /// Time since the previous frame, in milliseconds, after time scaling.
    pub delta: f64,
    /// Total scaled time since the scene started animating, in milliseconds.
    pub total: f64,
}

/// New viewport size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportResizeEvent {
    /// Render width in pixels.
    pub width: u32,
    /// Render height in pixels.
    pub height: u32,
    /// The camera node used for rendering, if it lives in the tree.
    pub camera: Option<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn new_event_bubbles_by_default() {
        let e = InteractionEvent::new(12.5);
        assert!(e.bubbles());
        assert!(!e.cancelable());
        assert!(!e.default_prevented());
        assert_eq!(e.time_stamp(), 12.5);
        assert_eq!(e.target(), None);
        assert_eq!(e.ty(), None);
    }

    #[test]
    fn stop_and_prevent_flags() {
        let mut e = InteractionEvent::new(0.0).with_cancelable(true);
        e.prevent_default();
        e.stop_immediate_propagation();
        assert!(e.default_prevented());
        assert!(e.bubbles(), "stop_immediate_propagation alone keeps bubbling");
        e.stop_propagation();
        assert!(!e.bubbles());

        let target = NodeId::new(3, 1);
        e.reset_for_dispatch(EventType::Click, target, true);
        assert!(e.bubbles());
        assert!(!e.default_prevented());
        assert!(!e.stopped_immediate);
        assert_eq!(e.target(), Some(target));
        assert_eq!(e.current_target(), Some(target));
        assert_eq!(e.ty(), Some(EventType::Click));
    }

    #[test]
    fn payload_accessors() {
        let a = NodeId::new(1, 1);
        let b = NodeId::new(2, 1);
        let hit = Intersection {
            object: a,
            distance: 4.0,
            point: Vec3::new(1.0, 2.0, 3.0),
            hitbox: None,
            instance_id: None,
        };
        let mut data = DataTransfer::new();
        data.set("ids", Vec::from([7_u32, 8]));
        let drag = InteractionEvent::drag(
            DragEvent {
                pointer: PointerEvent {
                    input: PointerInput::default(),
                    intersection: Some(hit.clone()),
                    related_target: Some(b),
                },
                data_transfer: data,
                position: Some(Vec3::X),
            },
            0.0,
        );
        assert_eq!(drag.related_target(), Some(b));
        assert_eq!(drag.intersection(), Some(&hit));
        assert_eq!(drag.position(), Some(Vec3::X));
        let ids = drag.data_transfer().and_then(|d| d.get::<Vec<u32>>("ids"));
        assert_eq!(ids.map(Vec::as_slice), Some(&[7_u32, 8][..]));
        assert!(drag.key().is_none());

        let focus = InteractionEvent::focus(Some(a), 0.0);
        assert_eq!(focus.related_target(), Some(a));
        assert!(focus.intersection().is_none());
    }

    #[test]
    fn data_transfer_type_mismatch_is_none() {
        let mut data = DataTransfer::new();
        data.set("label", String::from("crate"));
        assert!(data.get::<u32>("label").is_none());
        assert_eq!(data.get::<String>("label").map(String::as_str), Some("crate"));
        assert!(data.remove("label"));
        assert!(data.is_empty());
    }
}
