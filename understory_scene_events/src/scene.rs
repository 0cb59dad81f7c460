// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene roots: per-scene configuration, focus slot, and frame-driven events.

use crate::event::{AnimateEvent, Event, UpdateEvent, ViewportResizeEvent};
use crate::index::{RegistrationIndex, SceneIndex};
use crate::tree::Tree;
use crate::types::{EventType, NodeFlags, NodeId, Transform};

/// Settings of one scene root.
///
/// The raycasting and click-out switches are read by the interaction layer that
/// drives pointer events; the tree only stores them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneConfig {
    /// Hit-test every frame, even without pointer movement.
    pub continuous_raycasting: bool,
    /// Search for drop targets every frame while dragging.
    pub continuous_raycasting_drop_target: bool,
    /// Clear focus when a click lands outside any focusable node.
    pub blur_on_click_out: bool,
    /// Multiplier applied to frame deltas by [`Tree::animate`].
    pub time_scale: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            continuous_raycasting: false,
            continuous_raycasting_drop_target: false,
            blur_on_click_out: false,
            time_scale: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SceneState {
    pub(crate) config: SceneConfig,
    pub(crate) focused: Option<NodeId>,
    pub(crate) total_time: f64,
}

impl<I: RegistrationIndex> Tree<I> {
    /// Insert a new scene root.
    ///
    /// A scene root belongs to its own scene, is never focusable, and cannot be
    /// appended under another node.
    pub fn insert_scene(&mut self, config: SceneConfig) -> NodeId {
        let flags = self.defaults().flags() - NodeFlags::FOCUSABLE;
        let id = self.alloc(Transform::default(), flags);
        self.node_mut(id).scene = Some(id);
        self.scenes.insert(
            id,
            SceneState {
                config,
                ..SceneState::default()
            },
        );
        id
    }

    /// Configuration of a scene root.
    pub fn scene_config(&self, scene: NodeId) -> Option<&SceneConfig> {
        self.scenes
            .get(&scene)
            .filter(|_| self.is_alive(scene))
            .map(|s| &s.config)
    }

    /// Configuration of a scene root, mutably.
    pub fn scene_config_mut(&mut self, scene: NodeId) -> Option<&mut SceneConfig> {
        if !self.is_alive(scene) {
            return None;
        }
        self.scenes.get_mut(&scene).map(|s| &mut s.config)
    }

    /// Scaled time accumulated by [`Tree::animate`], in milliseconds.
    pub fn total_time(&self, scene: NodeId) -> Option<f64> {
        self.scenes
            .get(&scene)
            .filter(|_| self.is_alive(scene))
            .map(|s| s.total_time)
    }
}

impl Tree<SceneIndex> {
    /// Advance `scene` by `delta` milliseconds and fan out the frame events.
    ///
    /// The delta is multiplied by the scene's time scale and added to its total
    /// time. `beforeanimate`, `animate`, and `afteranimate` are then delivered, in
    /// that order, to every node of the scene registered for each type, in
    /// registration order.
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use understory_scene_events::{EventType, Listener, SceneConfig, Transform, Tree, UpdateEvent};
    ///
    /// let mut tree = Tree::new();
    /// let scene = tree.insert_scene(SceneConfig { time_scale: 0.5, ..Default::default() });
    /// let spinner = tree.insert(Some(scene), Transform::default());
    ///
    /// let total = Rc::new(Cell::new(0.0));
    /// let seen = total.clone();
    /// tree.on(spinner, EventType::Animate, Listener::new(move |_, _, ev| {
    ///     if let Some(UpdateEvent::Animate(a)) = ev.as_update() {
    ///         seen.set(a.total);
    ///     }
    /// }));
    ///
    /// tree.animate(scene, 16.0);
    /// tree.animate(scene, 16.0);
    /// assert_eq!(total.get(), 16.0);
    /// ```
    pub fn animate(&mut self, scene: NodeId, delta: f64) {
        if !self.is_scene_root(scene) {
            return;
        }
        let Some(state) = self.scenes.get_mut(&scene) else {
            return;
        };
        let delta = delta * state.config.time_scale;
        state.total_time += delta;
        let mut event = Event::Update(UpdateEvent::Animate(AnimateEvent {
            delta,
            total: state.total_time,
        }));
        for ty in [
            EventType::BeforeAnimate,
            EventType::Animate,
            EventType::AfterAnimate,
        ] {
            self.fan_out(scene, ty, &mut event);
        }
    }

    /// Deliver `viewportresize` to every node of `scene` registered for it.
    pub fn resize_viewport(
        &mut self,
        scene: NodeId,
        width: u32,
        height: u32,
        camera: Option<NodeId>,
    ) {
        if !self.is_scene_root(scene) {
            return;
        }
        let mut event = Event::Update(UpdateEvent::ViewportResize(ViewportResizeEvent {
            width,
            height,
            camera,
        }));
        self.fan_out(scene, EventType::ViewportResize, &mut event);
    }

    fn fan_out(&mut self, scene: NodeId, ty: EventType, event: &mut Event) {
        let nodes = self.index().nodes(scene, ty).to_vec();
        for node in nodes {
            // Skip nodes that left the scene during this fan-out.
            if self.scene_of(node) == Some(scene) {
                self.dispatch_direct(node, ty, event);
            }
        }
    }
}
