//! Transport state machine over one mixer and its current action.

use log::{debug, error, warn};

use super::mixer::{ActionId, AnimationMixer};
use crate::gfx::scene::SceneGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Play/pause/resume/reset semantics for the active model's animation
///
/// Errors raised while advancing the mixer never escape: they are logged and
/// playback drops to `Paused` so the render loop keeps running.
#[derive(Debug, Default)]
pub struct AnimationController {
    state: PlaybackState,
    current: Option<ActionId>,
    last_paused_time: f32,
}

impl AnimationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current(&self) -> Option<ActionId> {
        self.current
    }

    pub fn last_paused_time(&self) -> f32 {
        self.last_paused_time
    }

    /// Starts or resumes playback
    ///
    /// Binds the first action when nothing is bound yet; otherwise seeks the
    /// mixer back to the recorded pause time and un-pauses the bound action.
    pub fn start(&mut self, mixer: &mut AnimationMixer, actions: &[ActionId], graph: &mut SceneGraph) {
        if self.state == PlaybackState::Playing {
            return;
        }
        let Some(&first) = actions.first() else {
            debug!("No animations to play");
            return;
        };

        match self.current {
            None => {
                let Some(action) = mixer.action_mut(first) else {
                    warn!("Animation action is no longer registered with the mixer");
                    return;
                };
                action.play();
                self.current = Some(first);
            }
            Some(current) => {
                let resume_at = self.last_paused_time;
                if let Some(action) = mixer.action_mut(current) {
                    action.paused = false;
                    action.time = resume_at;
                    action.play();
                }
                if let Err(e) = mixer.set_time(resume_at, graph) {
                    error!("Failed to resume animation at {:.3}s: {}", resume_at, e);
                    self.enter_paused(mixer);
                    return;
                }
            }
        }

        self.state = PlaybackState::Playing;
        debug!("Animation playing");
    }

    /// Pauses playback, recording the mixer time for an exact resume
    pub fn pause(&mut self, mixer: &mut AnimationMixer) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.enter_paused(mixer);
        debug!("Animation paused at {:.3}s", self.last_paused_time);
    }

    fn enter_paused(&mut self, mixer: &mut AnimationMixer) {
        self.state = PlaybackState::Paused;
        self.last_paused_time = mixer.time();
        if let Some(action) = self.current.and_then(|id| mixer.action_mut(id)) {
            action.paused = true;
        }
    }

    /// Stops and rewinds the current action and returns to `Idle`
    pub fn reset(&mut self, mixer: &mut AnimationMixer, graph: &mut SceneGraph) {
        if let Some(action) = self.current.and_then(|id| mixer.action_mut(id)) {
            action.stop();
            action.reset();
        }
        if let Err(e) = mixer.set_time(0.0, graph) {
            warn!("Failed to rewind mixer: {}", e);
        }
        self.state = PlaybackState::Idle;
        self.current = None;
        self.last_paused_time = 0.0;
    }

    /// Advances the mixer while playing
    pub fn update(&mut self, mixer: &mut AnimationMixer, graph: &mut SceneGraph, delta: f32) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Err(e) = mixer.update(delta, graph) {
            error!("Animation update failed, pausing playback: {}", e);
            self.enter_paused(mixer);
        }
    }

    /// Forgets the bound action without touching any mixer
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{AnimationClip, KeyframeTrack};
    use crate::gfx::scene::Node;
    use cgmath::Vector3;

    fn rig() -> (SceneGraph, AnimationMixer, Vec<ActionId>) {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(Node::group("model"));
        let bone = graph.add_node(Node::group("bone"));
        graph.attach(root, bone);
        graph.add_to_root(root);
        let clip = AnimationClip::new(
            "move",
            vec![KeyframeTrack::translation(
                "bone",
                vec![0.0, 10.0],
                vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(10.0, 0.0, 0.0)],
            )],
        );
        let mut mixer = AnimationMixer::new(root);
        let actions = vec![mixer.clip_action(&clip)];
        (graph, mixer, actions)
    }

    #[test]
    fn test_start_pause_start_resumes_at_pause_time() {
        let (mut graph, mut mixer, actions) = rig();
        let mut controller = AnimationController::new();

        controller.start(&mut mixer, &actions, &mut graph);
        controller.update(&mut mixer, &mut graph, 1.0);
        controller.update(&mut mixer, &mut graph, 0.23);
        controller.pause(&mut mixer);
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert!((controller.last_paused_time() - 1.23).abs() < 1e-5);

        // updates while paused do not move the mixer
        controller.update(&mut mixer, &mut graph, 5.0);
        assert!((mixer.time() - 1.23).abs() < 1e-5);

        controller.start(&mut mixer, &actions, &mut graph);
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert!((mixer.time() - 1.23).abs() < 1e-5);
        let action = mixer.action(actions[0]).unwrap();
        assert!((action.time - 1.23).abs() < 1e-5);
        assert!(!action.paused);
    }

    #[test]
    fn test_start_is_idempotent_while_playing() {
        let (mut graph, mut mixer, actions) = rig();
        let mut controller = AnimationController::new();
        controller.start(&mut mixer, &actions, &mut graph);
        controller.update(&mut mixer, &mut graph, 0.5);
        controller.start(&mut mixer, &actions, &mut graph);
        assert!((mixer.time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reset_from_any_state() {
        for pause_first in [false, true] {
            let (mut graph, mut mixer, actions) = rig();
            let mut controller = AnimationController::new();
            controller.start(&mut mixer, &actions, &mut graph);
            controller.update(&mut mixer, &mut graph, 2.0);
            if pause_first {
                controller.pause(&mut mixer);
            }
            controller.reset(&mut mixer, &mut graph);

            assert_eq!(controller.state(), PlaybackState::Idle);
            assert_eq!(controller.last_paused_time(), 0.0);
            assert!(controller.current().is_none());
            assert_eq!(mixer.time(), 0.0);
        }
    }

    #[test]
    fn test_start_without_actions_stays_idle() {
        let (mut graph, mut mixer, _) = rig();
        let mut controller = AnimationController::new();
        controller.start(&mut mixer, &[], &mut graph);
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_update_failure_pauses() {
        let (mut graph, mut mixer, actions) = rig();
        let mut controller = AnimationController::new();
        controller.start(&mut mixer, &actions, &mut graph);

        let bone = graph.find_by_name(mixer.root(), "bone").unwrap();
        graph.remove_subtree(bone);

        controller.update(&mut mixer, &mut graph, 0.1);
        assert_eq!(controller.state(), PlaybackState::Paused);
    }
}
