// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types: node identifiers, flags, event type tags, and transforms.

use glam::{Quat, Vec3};

/// Identifier for a node in the tree (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-node interaction state.
    ///
    /// Only `ENABLED` and `VISIBLE` take part in the effective-state queries
    /// ([`Tree::enabled_state`](crate::Tree::enabled_state) and
    /// [`Tree::visibility_state`](crate::Tree::visibility_state)). `FOCUSED` and
    /// `DROP_TARGET` are derived and cannot be set directly.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u16 {
        /// Node accepts interaction events.
        const ENABLED                = 1 << 0;
        /// Node is visible.
        const VISIBLE                = 1 << 1;
        /// The primary pointer is over this node.
        const HOVERED                = 1 << 2;
        /// Node is the focus target of its scene.
        const FOCUSED                = 1 << 3;
        /// A pointer button went down on this node and has not been released.
        const CLICKING               = 1 << 4;
        /// Node is being dragged.
        const DRAGGING               = 1 << 5;
        /// Node listens to at least one drag-target event type.
        const DROP_TARGET            = 1 << 6;
        /// Node takes part in pointer interaction.
        const INTERACTABLE           = 1 << 7;
        /// Node can receive focus.
        const FOCUSABLE              = 1 << 8;
        /// Node can be dragged.
        const DRAGGABLE              = 1 << 9;
        /// While dragged, the node searches for drop targets.
        const FIND_DROP_TARGET       = 1 << 10;
        /// Node and its subtree can be intercepted by the main raycaster.
        const INTERCEPT_BY_RAYCASTER = 1 << 11;
    }
}

bitflags::bitflags! {
    /// Change notifications a node has opted into.
    ///
    /// A bit is set the first time a listener for the matching event type is
    /// added to the node and is never cleared afterwards.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Instrumented: u8 {
        /// `positionchange`.
        const POSITION   = 1 << 0;
        /// `scalechange`.
        const SCALE      = 1 << 1;
        /// `rotationchange`, covering both rotation representations.
        const ROTATION   = 1 << 2;
        /// `visiblechange`.
        ///
        /// Informational only: [`Tree::set_visible`](crate::Tree::set_visible)
        /// broadcasts on every change whether or not any node carries this bit.
        /// The transform bits above gate their setters.
        const VISIBILITY = 1 << 3;
    }
}

impl Instrumented {
    /// The instrumentation bit requested by a listener of `ty`, if any.
    pub fn for_type(ty: EventType) -> Option<Self> {
        match ty {
            EventType::PositionChange => Some(Self::POSITION),
            EventType::ScaleChange => Some(Self::SCALE),
            EventType::RotationChange => Some(Self::ROTATION),
            EventType::VisibleChange => Some(Self::VISIBILITY),
            _ => None,
        }
    }
}

/// How an event type travels through the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropagationClass {
    /// Delivered at a target and, when bubbling, at each ancestor in turn.
    Interaction,
    /// Delivered only at the node that raised it.
    Misc,
    /// Delivered at the node that raised it, then at every descendant (pre-order).
    Broadcast,
}

/// Event type tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum EventType {
    /// A pointer enters the target.
    PointerOver,
    /// A pointer enters the target (not meant to bubble).
    PointerEnter,
    /// A pointer leaves the target.
    PointerOut,
    /// A pointer leaves the target (not meant to bubble).
    PointerLeave,
    /// A pointer moves over the target.
    PointerMove,
    /// A pointer button is pressed.
    PointerDown,
    /// A pointer button is released.
    PointerUp,
    /// The pointer is on the target; fired every frame under continuous raycasting.
    PointerIntersection,
    /// A click.
    Click,
    /// A double click.
    DblClick,
    /// Wheel scrolling.
    Wheel,
    /// The target gains focus (not meant to bubble).
    FocusIn,
    /// The target loses focus (not meant to bubble).
    FocusOut,
    /// The target gains focus.
    Focus,
    /// The target loses focus.
    Blur,
    /// A key is pressed while the target is focused.
    KeyDown,
    /// A key is released while the target is focused.
    KeyUp,
    /// The target is dragged.
    Drag,
    /// Dragging starts.
    DragStart,
    /// Dragging ends.
    DragEnd,
    /// Dragging is canceled.
    DragCancel,
    /// A dragged node enters a drop target.
    DragEnter,
    /// A dragged node moves over a drop target.
    DragOver,
    /// A dragged node leaves a drop target.
    DragLeave,
    /// A dragged node is dropped onto a drop target.
    Drop,
    /// The node's position changed.
    PositionChange,
    /// The node's scale changed.
    ScaleChange,
    /// The node's rotation changed.
    RotationChange,
    /// The `enabled` flag of the node or one of its ancestors changed.
    EnabledChange,
    /// The `visible` flag of the node or one of its ancestors changed.
    VisibleChange,
    /// The viewport size differs from the previous render.
    ViewportResize,
    /// Every frame, before [`EventType::Animate`].
    BeforeAnimate,
    /// Every frame.
    Animate,
    /// Every frame, after [`EventType::Animate`].
    AfterAnimate,
}

impl EventType {
    /// The four event types whose listeners make a node a drop target.
    pub const DROP_TARGET_TYPES: [Self; 4] =
        [Self::Drop, Self::DragEnter, Self::DragLeave, Self::DragOver];

    /// Propagation class of this type.
    pub const fn class(self) -> PropagationClass {
        match self {
            Self::PositionChange
            | Self::ScaleChange
            | Self::RotationChange
            | Self::EnabledChange
            | Self::VisibleChange => PropagationClass::Broadcast,
            Self::ViewportResize | Self::BeforeAnimate | Self::Animate | Self::AfterAnimate => {
                PropagationClass::Misc
            }
            _ => PropagationClass::Interaction,
        }
    }

    /// Whether listeners of this type make a node a drop target.
    pub const fn is_drop_target_type(self) -> bool {
        matches!(
            self,
            Self::Drop | Self::DragEnter | Self::DragLeave | Self::DragOver
        )
    }

    /// The lowercase DOM-style name of this type, e.g. `"pointerdown"`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PointerOver => "pointerover",
            Self::PointerEnter => "pointerenter",
            Self::PointerOut => "pointerout",
            Self::PointerLeave => "pointerleave",
            Self::PointerMove => "pointermove",
            Self::PointerDown => "pointerdown",
            Self::PointerUp => "pointerup",
            Self::PointerIntersection => "pointerintersection",
            Self::Click => "click",
            Self::DblClick => "dblclick",
            Self::Wheel => "wheel",
            Self::FocusIn => "focusin",
            Self::FocusOut => "focusout",
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::Drag => "drag",
            Self::DragStart => "dragstart",
            Self::DragEnd => "dragend",
            Self::DragCancel => "dragcancel",
            Self::DragEnter => "dragenter",
            Self::DragOver => "dragover",
            Self::DragLeave => "dragleave",
            Self::Drop => "drop",
            Self::PositionChange => "positionchange",
            Self::ScaleChange => "scalechange",
            Self::RotationChange => "rotationchange",
            Self::EnabledChange => "enabledchange",
            Self::VisibleChange => "visiblechange",
            Self::ViewportResize => "viewportresize",
            Self::BeforeAnimate => "beforeanimate",
            Self::Animate => "animate",
            Self::AfterAnimate => "afteranimate",
        }
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Local transform of a node.
///
/// `rotation` holds intrinsic XYZ Euler angles in radians and is always
/// consistent with `quaternion`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation relative to the parent.
    pub position: Vec3,
    /// Per-axis scale.
    pub scale: Vec3,
    /// Euler angles (XYZ order, radians).
    pub rotation: Vec3,
    /// Orientation as a unit quaternion.
    pub quaternion: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
        }
    }
}

impl Transform {
    /// A transform at `position` with unit scale and no rotation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Replace the Euler angles and refresh the quaternion.
    pub(crate) fn apply_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.quaternion = Quat::from_euler(glam::EulerRot::XYZ, rotation.x, rotation.y, rotation.z);
    }

    /// Replace the quaternion and refresh the Euler angles.
    pub(crate) fn apply_quaternion(&mut self, quaternion: Quat) {
        self.quaternion = quaternion;
        self.rotation = Vec3::from(quaternion.to_euler(glam::EulerRot::XYZ));
    }
}

/// Default interaction properties applied to newly inserted nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InteractionDefaults {
    /// Whether new nodes are focusable. Scene roots never are.
    pub focusable: bool,
    /// Whether new nodes are draggable.
    pub draggable: bool,
    /// Whether new nodes can be intercepted by the main raycaster.
    pub intercept_by_raycaster: bool,
}

impl Default for InteractionDefaults {
    fn default() -> Self {
        Self {
            focusable: true,
            draggable: false,
            intercept_by_raycaster: true,
        }
    }
}

impl InteractionDefaults {
    pub(crate) fn flags(self) -> NodeFlags {
        let mut flags = NodeFlags::ENABLED | NodeFlags::VISIBLE;
        flags.set(NodeFlags::FOCUSABLE, self.focusable);
        flags.set(NodeFlags::DRAGGABLE, self.draggable);
        flags.set(NodeFlags::INTERCEPT_BY_RAYCASTER, self.intercept_by_raycaster);
        flags
    }
}
