//! Animation mixer: drives clip actions and writes sampled poses onto nodes.

use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use super::clip::{AnimationClip, Sample, TrackProperty};
use crate::gfx::scene::{NodeId, SceneGraph};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnimationError {
    #[error("clip '{clip}' targets node '{node}' which is not under the mixer root")]
    MissingTarget { clip: String, node: String },

    #[error("mixer root node no longer exists")]
    RootRemoved,
}

/// Handle to an action owned by a mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    Once,
    #[default]
    Repeat,
}

/// Live, playable binding of a clip to the mixer's root
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Rc<AnimationClip>,
    pub time: f32,
    pub paused: bool,
    running: bool,
    pub loop_mode: LoopMode,
    fade_in: Option<(f32, f32)>,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip: Rc::new(clip),
            time: 0.0,
            paused: false,
            running: false,
            loop_mode: LoopMode::Repeat,
            fade_in: None,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn play(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.fade_in = None;
    }

    /// Rewinds to the start and clears the pause flag
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.paused = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_loop(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    /// Ramps the action's influence from 0 to 1 over `duration` seconds
    pub fn fade_in(&mut self, duration: f32) {
        self.fade_in = (duration > 0.0).then_some((duration, 0.0));
    }

    /// Current blend weight in `[0, 1]`
    pub fn weight(&self) -> f32 {
        match self.fade_in {
            Some((duration, elapsed)) => (elapsed / duration).clamp(0.0, 1.0),
            None => 1.0,
        }
    }

    fn advance(&mut self, dt: f32) {
        if !self.running || self.paused {
            return;
        }
        if let Some((duration, elapsed)) = self.fade_in {
            let elapsed = elapsed + dt;
            self.fade_in = (elapsed < duration).then_some((duration, elapsed));
        }

        let duration = self.clip.duration;
        self.time += dt;
        match self.loop_mode {
            LoopMode::Repeat if duration > 0.0 => self.time = self.time.rem_euclid(duration),
            LoopMode::Once if self.time >= duration => {
                self.time = duration;
                self.running = false;
            }
            _ => {}
        }
    }
}

/// Advances actions and applies their tracks to nodes beneath `root`
#[derive(Debug)]
pub struct AnimationMixer {
    root: NodeId,
    time: f32,
    actions: Vec<AnimationAction>,
    bindings: HashMap<String, NodeId>,
}

impl AnimationMixer {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            time: 0.0,
            actions: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total seconds the mixer has been advanced
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Returns the action for `clip`, creating it on first request
    pub fn clip_action(&mut self, clip: &AnimationClip) -> ActionId {
        if let Some(index) = self.actions.iter().position(|a| a.clip.name == clip.name) {
            return ActionId(index);
        }
        self.actions.push(AnimationAction::new(clip.clone()));
        ActionId(self.actions.len() - 1)
    }

    pub fn action(&self, id: ActionId) -> Option<&AnimationAction> {
        self.actions.get(id.0)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut AnimationAction> {
        self.actions.get_mut(id.0)
    }

    pub fn action_ids(&self) -> impl Iterator<Item = ActionId> + '_ {
        (0..self.actions.len()).map(ActionId)
    }

    pub fn stop_all_action(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    fn resolve(&mut self, graph: &SceneGraph, clip: &str, name: &str) -> Result<NodeId, AnimationError> {
        if let Some(id) = self.bindings.get(name) {
            if graph.node(*id).is_some() {
                return Ok(*id);
            }
        }
        let id = graph
            .find_by_name(self.root, name)
            .ok_or_else(|| AnimationError::MissingTarget {
                clip: clip.to_string(),
                node: name.to_string(),
            })?;
        self.bindings.insert(name.to_string(), id);
        Ok(id)
    }

    /// Advances every running action by `dt` and applies the results
    pub fn update(&mut self, dt: f32, graph: &mut SceneGraph) -> Result<(), AnimationError> {
        if graph.node(self.root).is_none() {
            return Err(AnimationError::RootRemoved);
        }
        self.time += dt;

        for index in 0..self.actions.len() {
            self.actions[index].advance(dt);
            let action = &self.actions[index];
            if !action.running {
                continue;
            }
            let (time, weight) = (action.time, action.weight());
            let clip = Rc::clone(&action.clip);

            for track in &clip.tracks {
                let target = self.resolve(graph, &clip.name, &track.node_name)?;
                let Some(sample) = track.sample(time) else {
                    continue;
                };
                let Some(node) = graph.node_mut(target) else {
                    continue;
                };
                let transform = &mut node.transform;
                match (track.property, sample) {
                    (TrackProperty::Translation, Sample::Vec3(v)) => {
                        transform.position = transform.position + (v - transform.position) * weight;
                    }
                    (TrackProperty::Scale, Sample::Vec3(v)) => {
                        transform.scale = transform.scale + (v - transform.scale) * weight;
                    }
                    (TrackProperty::Rotation, Sample::Quat(q)) => {
                        transform.rotation = if weight >= 1.0 {
                            q
                        } else {
                            transform.rotation.nlerp(q, weight)
                        };
                    }
                    _ => trace!("Track value kind does not match property on '{}'", track.node_name),
                }
            }
        }
        Ok(())
    }

    /// Rewinds the mixer and every action to 0, then advances to `t`
    pub fn set_time(&mut self, t: f32, graph: &mut SceneGraph) -> Result<(), AnimationError> {
        self.time = 0.0;
        for action in &mut self.actions {
            action.time = 0.0;
        }
        self.update(t, graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::KeyframeTrack;
    use crate::gfx::scene::Node;
    use cgmath::Vector3;

    fn setup() -> (SceneGraph, NodeId, NodeId, AnimationClip) {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(Node::group("model"));
        let bone = graph.add_node(Node::group("bone"));
        graph.attach(root, bone);
        let clip = AnimationClip::new(
            "move",
            vec![KeyframeTrack::translation(
                "bone",
                vec![0.0, 2.0],
                vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)],
            )],
        );
        (graph, root, bone, clip)
    }

    #[test]
    fn test_update_applies_track() {
        let (mut graph, root, bone, clip) = setup();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        mixer.action_mut(action).unwrap().play();

        mixer.update(1.0, &mut graph).unwrap();
        assert!((graph.node(bone).unwrap().transform.position.x - 1.0).abs() < 1e-5);
        assert_eq!(mixer.time(), 1.0);
    }

    #[test]
    fn test_update_shares_clip_data() {
        let (mut graph, root, _, clip) = setup();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        mixer.action_mut(action).unwrap().play();
        for _ in 0..3 {
            mixer.update(0.1, &mut graph).unwrap();
        }
        // The per-frame handle is released once the tracks are applied
        assert_eq!(Rc::strong_count(&mixer.actions[0].clip), 1);
        assert_eq!(mixer.action(action).unwrap().clip().name, "move");
    }

    #[test]
    fn test_clip_action_is_cached() {
        let (_, root, _, clip) = setup();
        let mut mixer = AnimationMixer::new(root);
        assert_eq!(mixer.clip_action(&clip), mixer.clip_action(&clip));
    }

    #[test]
    fn test_set_time_rewinds_then_advances() {
        let (mut graph, root, _, clip) = setup();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        mixer.action_mut(action).unwrap().play();
        mixer.update(1.9, &mut graph).unwrap();

        mixer.set_time(0.5, &mut graph).unwrap();
        assert_eq!(mixer.time(), 0.5);
        assert!((mixer.action(action).unwrap().time - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_repeat_wraps_time() {
        let (mut graph, root, _, clip) = setup();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        mixer.action_mut(action).unwrap().play();
        mixer.update(2.5, &mut graph).unwrap();
        assert!((mixer.action(action).unwrap().time - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_missing_target() {
        let (mut graph, root, _, _) = setup();
        let clip = AnimationClip::new(
            "broken",
            vec![KeyframeTrack::scale("ghost", vec![0.0, 1.0], vec![Vector3::new(1.0, 1.0, 1.0); 2])],
        );
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        mixer.action_mut(action).unwrap().play();
        assert!(matches!(
            mixer.update(0.1, &mut graph),
            Err(AnimationError::MissingTarget { .. })
        ));
    }

    #[test]
    fn test_fade_in_weight() {
        let (_, root, _, clip) = setup();
        let mut mixer = AnimationMixer::new(root);
        let id = mixer.clip_action(&clip);
        let action = mixer.action_mut(id).unwrap();
        action.fade_in(0.5);
        action.play();
        assert_eq!(action.weight(), 0.0);
        action.advance(0.25);
        assert!((action.weight() - 0.5).abs() < 1e-6);
        action.advance(0.5);
        assert_eq!(action.weight(), 1.0);
    }
}
