//! # Events
//!
//! Two directions of traffic between the viewer and its host:
//!
//! - [`SceneCommand`] - operations the host UI asks for (reset view, toggle
//!   the grid, change a light ...). Commands deserialize from
//!   `{"event": "<key>", "payload": ...}` using the viewer's event keys.
//! - [`SceneEvent`] - change notifications pushed to subscribers of an
//!   [`EventBus`].
//!
//! ## Usage
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use model_viewer::events::{EventBus, SceneCommand, SceneEvent};
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let mut bus = EventBus::new();
//! let id = bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
//! bus.emit(SceneEvent::Disposed);
//! bus.unsubscribe(id);
//! bus.emit(SceneEvent::Disposed);
//! assert_eq!(seen.borrow().len(), 1);
//!
//! let command = SceneCommand::from_json(r#"{ "event": "toggleGrid", "payload": true }"#)?;
//! assert_eq!(command, SceneCommand::ToggleGrid(true));
//! # Ok::<(), model_viewer::ViewerError>(())
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::animation::PlaybackState;
use crate::config::Position;
use crate::error::ViewerResult;
use crate::gfx::color::Color;
use crate::gfx::lights::LightRole;
use crate::gfx::resources::material::MaterialKind;

/// Host-issued operations, keyed by the viewer's event names
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum SceneCommand {
    ResetView,
    TakeScreenshot,
    StartAnimation,
    PauseAnimation,
    ResetAnimation,
    ToggleGrid(bool),
    ToggleStats(bool),
    ToggleAxes(bool),
    ToggleFloor(bool),
    UpdateFloorColor(Color),
    UpdateFloorOpacity(f32),
    UpdateGridColor(Color),
    UpdateBackgroundColor(Color),
    /// Uniform model scale
    ScaleChange(f32),
    #[serde(rename_all = "camelCase")]
    LightChange {
        light_type: String,
        property: String,
        value: Value,
    },
    MaterialChange {
        name: String,
        property: String,
        value: Value,
    },
    /// `None` clears the selection
    SelectMaterial(Option<String>),
    ConvertMaterial {
        /// A material name or `all`
        target: String,
        kind: MaterialKind,
    },
    UpdateModelPosition(Position),
    /// Euler angles in radians
    UpdateModelRotation(Position),
}

impl SceneCommand {
    pub fn from_json(json: &str) -> ViewerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Named environment helpers, as reported in [`SceneEvent::HelperToggled`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperName {
    Grid,
    Axes,
    Floor,
    Stats,
}

/// Notifications pushed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// Model transfer progress in [0, 1]
    LoadProgress(f32),
    ModelLoaded { url: String, meshes: usize, clips: usize },
    ModelFailed { url: String, message: String },
    /// The material list changed; carries the new entry count
    MaterialsChanged(usize),
    MaterialSelected(Option<String>),
    AnimationState(PlaybackState),
    HelperToggled { helper: HelperName, shown: bool },
    LightChanged(LightRole),
    BackgroundChanged,
    ScreenshotTaken { bytes: usize },
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&SceneEvent)>;

/// Single-threaded observer list
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Callback)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SceneEvent) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` for unknown or already removed ids
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(s, _)| *s != id);
        before != self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers `event` to every subscriber in subscription order
    pub fn emit(&mut self, event: SceneEvent) {
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_commands_from_event_keys() {
        let cases = [
            (r#"{"event":"resetView"}"#, SceneCommand::ResetView),
            (r#"{"event":"startAnimation"}"#, SceneCommand::StartAnimation),
            (r#"{"event":"toggleFloor","payload":false}"#, SceneCommand::ToggleFloor(false)),
            (
                r##"{"event":"updateFloorColor","payload":"#ff0000"}"##,
                SceneCommand::UpdateFloorColor(Color::from_hex(0xff0000)),
            ),
            (r#"{"event":"scaleChange","payload":0.5}"#, SceneCommand::ScaleChange(0.5)),
            (
                r#"{"event":"updateModelPosition","payload":{"x":1,"y":2,"z":3}}"#,
                SceneCommand::UpdateModelPosition(Position::new(1.0, 2.0, 3.0)),
            ),
        ];
        for (json, expected) in cases {
            assert_eq!(SceneCommand::from_json(json).unwrap(), expected);
        }
    }

    #[test]
    fn test_struct_commands() {
        let command = SceneCommand::from_json(
            r#"{"event":"lightChange","payload":{"lightType":"point","property":"intensity","value":2}}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            SceneCommand::LightChange {
                light_type: "point".into(),
                property: "intensity".into(),
                value: json!(2),
            }
        );

        let command =
            SceneCommand::from_json(r#"{"event":"convertMaterial","payload":{"target":"all","kind":"phong"}}"#).unwrap();
        assert_eq!(
            command,
            SceneCommand::ConvertMaterial {
                target: "all".into(),
                kind: MaterialKind::Phong,
            }
        );
    }

    #[test]
    fn test_unknown_command() {
        assert!(SceneCommand::from_json(r#"{"event":"explode"}"#).is_err());
    }

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let a = {
            let log = log.clone();
            bus.subscribe(move |e| log.borrow_mut().push(("a", e.clone())))
        };
        {
            let log = log.clone();
            bus.subscribe(move |e| log.borrow_mut().push(("b", e.clone())));
        }

        bus.emit(SceneEvent::LoadProgress(0.5));
        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        bus.emit(SceneEvent::Disposed);

        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], ("a", SceneEvent::LoadProgress(0.5)));
        assert_eq!(log[2], ("b", SceneEvent::Disposed));
        assert_eq!(bus.subscriber_count(), 1);
    }
}
