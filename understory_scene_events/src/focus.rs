// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus controller: one focused node per scene root.
//!
//! A transition from `old` to `new` fires, in order:
//!
//! 1. `blur` (bubbling) then `focusout` (at target) on `old`, related target `new`,
//!    only if `old` is effectively enabled;
//! 2. `focus` (bubbling) then `focusin` (at target) on `new`, related target `old`.
//!
//! The scene's slot and both nodes' `FOCUSED` flags are updated before any
//! event fires, so every listener sees [`Tree::is_focused`] agree with
//! [`Tree::focused`]. Listeners may start another transition; the outer one
//! then skips whatever it has left, so the nested transition's events describe
//! the final state.

use crate::event::InteractionEvent;
use crate::index::RegistrationIndex;
use crate::tree::Tree;
use crate::types::{EventType, NodeFlags, NodeId};

impl<I: RegistrationIndex> Tree<I> {
    /// The focused node of `scene`.
    pub fn focused(&self, scene: NodeId) -> Option<NodeId> {
        self.scenes
            .get(&scene)
            .and_then(|s| s.focused)
            .filter(|&n| self.is_alive(n))
    }

    /// Move `scene`'s focus to `target`'s first focusable node, or clear it.
    ///
    /// With `Some(target)`, focus goes to [`Tree::first_focusable`] of `target`.
    /// The request is ignored if that node is not effectively enabled, already
    /// focused, or belongs to another scene. A target without a focusable
    /// ancestor clears focus, as does `None`.
    ///
    /// ```
    /// use understory_scene_events::{Transform, Tree};
    ///
    /// let mut tree = Tree::new();
    /// let scene = tree.insert_scene(Default::default());
    /// let field = tree.insert(Some(scene), Transform::default());
    ///
    /// tree.focus(scene, Some(field));
    /// assert_eq!(tree.focused(scene), Some(field));
    /// assert!(tree.is_focused(field));
    ///
    /// tree.focus(scene, None);
    /// assert_eq!(tree.focused(scene), None);
    /// assert!(!tree.is_focused(field));
    /// ```
    pub fn focus(&mut self, scene: NodeId, target: Option<NodeId>) {
        if !self.is_scene_root(scene) {
            return;
        }
        let resolved = target.and_then(|t| self.first_focusable(t));
        if let Some(node) = resolved {
            if !self.enabled_state(node) {
                return;
            }
            if self.scene_of(node) != Some(scene) {
                tracing::debug!(?scene, ?node, "ignoring focus request from another scene");
                return;
            }
        }
        let old = self.focused(scene);
        if old == resolved {
            return;
        }
        tracing::debug!(?scene, ?old, new = ?resolved, "focus transition");
        self.set_focus_slot(scene, resolved);
        if let Some(n) = old.and_then(|old| self.node_opt_mut(old)) {
            n.flags.remove(NodeFlags::FOCUSED);
        }
        if let Some(n) = resolved.and_then(|new| self.node_opt_mut(new)) {
            n.flags.insert(NodeFlags::FOCUSED);
        }

        if let Some(old) = old
            && self.enabled_state(old)
        {
            let now = self.clock();
            let mut blur = InteractionEvent::focus(resolved, now);
            self.dispatch_with_bubbling(old, EventType::Blur, &mut blur);
            let mut focus_out = InteractionEvent::focus(resolved, now);
            self.dispatch_at_target(old, EventType::FocusOut, &mut focus_out);
        }

        let Some(new) = resolved else {
            return;
        };
        if self.focused(scene) != Some(new) {
            // A listener moved focus elsewhere.
            return;
        }
        let now = self.clock();
        let mut focus = InteractionEvent::focus(old, now);
        self.dispatch_with_bubbling(new, EventType::Focus, &mut focus);
        if self.focused(scene) == Some(new) {
            let mut focus_in = InteractionEvent::focus(old, now);
            self.dispatch_at_target(new, EventType::FocusIn, &mut focus_in);
        }
    }

    /// Clear focus of `node`'s scene if `node` is the focused node.
    pub fn blur_if_focused(&mut self, node: NodeId) {
        if let Some(scene) = self.scene_of(node)
            && self.focused(scene) == Some(node)
        {
            self.focus(scene, None);
        }
    }

    /// Focus `node` within its own scene.
    pub fn apply_focus(&mut self, node: NodeId) {
        if let Some(scene) = self.scene_of(node) {
            self.focus(scene, Some(node));
        }
    }

    /// Remove focus from `node`; same as [`Tree::blur_if_focused`].
    pub fn apply_blur(&mut self, node: NodeId) {
        self.blur_if_focused(node);
    }

    fn set_focus_slot(&mut self, scene: NodeId, node: Option<NodeId>) {
        if let Some(state) = self.scenes.get_mut(&scene) {
            state.focused = node;
        }
    }
}
