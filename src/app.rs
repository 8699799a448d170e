//! # Scene Orchestration
//!
//! [`SceneContext`] owns one viewer instance: container, scene graph,
//! renderer, camera and controls, light rig, helpers, the active model with
//! its materials and animation, plus the render loop state.
//!
//! Slow work (model, texture and background fetches) is split in two: a job
//! that only holds shared handles to the asset source runs to completion
//! without touching the scene, then its result is handed back to the context.
//! Results produced for a scene that has since been disposed or rebuilt are
//! discarded.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use model_viewer::config::ViewerConfig;
//! use model_viewer::surface::HeadlessContainer;
//! use model_viewer::SceneContext;
//!
//! # async fn run() -> model_viewer::ViewerResult<()> {
//! let mut ctx = SceneContext::new(ViewerConfig::default());
//! ctx.mount(Box::new(HeadlessContainer::new(800, 600)));
//! let token = ctx.init_scene("assets/robot.glb").await?;
//! while ctx.frame(token, 1.0 / 60.0) {
//!     # break;
//! }
//! ctx.dispose();
//! # Ok(())
//! # }
//! ```

use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use image::ImageFormat;
use log::{debug, error, info, warn};

use crate::animation::{ActionId, AnimationController, AnimationMixer};
use crate::config::{BackgroundConfig, BackgroundKind, Position, ViewerConfig};
use crate::error::{ViewerError, ViewerResult};
use crate::events::{EventBus, HelperName, SceneCommand, SceneEvent, SubscriptionId};
use crate::gfx::camera::{CameraManager, ControlsManager};
use crate::gfx::color::Color;
use crate::gfx::helpers::HelperSet;
use crate::gfx::lights::{LightRig, LightRole};
use crate::gfx::render::{headless_factory, FrameStats, Renderer, RendererFactory};
use crate::gfx::resources::material::MaterialKind;
use crate::gfx::resources::registry::{MaterialProperty, MaterialRegistry, Target, TextureRequest};
use crate::gfx::resources::texture::{Texture, TextureLoader};
use crate::gfx::scene::{Background, SceneGraph};
use crate::loader::asset::LoadedModel;
use crate::loader::install::{install, ActiveModel};
use crate::loader::source::{AssetSource, FileSource};
use crate::loader::{self, LoaderOptions, LoaderRegistry};
use crate::surface::Container;

/// Identifies one run of the render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopToken(u64);

/// Start/stop state for the host-driven frame loop
///
/// Every start hands out a fresh token and every stop invalidates all
/// tokens, so a frame callback scheduled before a stop never runs again.
#[derive(Debug, Default)]
pub struct RenderLoop {
    generation: u64,
    running: bool,
}

impl RenderLoop {
    pub fn start(&mut self) -> LoopToken {
        self.generation += 1;
        self.running = true;
        LoopToken(self.generation)
    }

    pub fn stop(&mut self) {
        if self.running {
            self.generation += 1;
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_live(&self, token: LoopToken) -> bool {
        self.running && token.0 == self.generation
    }
}

/// A model fetch that borrows nothing from the scene
pub struct ModelJob {
    url: String,
    options: LoaderOptions,
    registry: Rc<LoaderRegistry>,
    source: Rc<dyn AssetSource>,
    scene: u64,
}

/// Outcome of a [`ModelJob`], applied with [`SceneContext::install_model`]
pub struct ModelDone {
    pub url: String,
    pub result: ViewerResult<LoadedModel>,
    scene: u64,
}

impl ModelJob {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// # Arguments
    /// * `progress` - Receives a non-decreasing ratio in `[0, 1]`
    pub async fn run(self, progress: &mut dyn FnMut(f32)) -> ModelDone {
        let result = loader::load_model(
            &self.url,
            &self.options,
            &self.registry,
            self.source.as_ref(),
            progress,
        )
        .await;
        ModelDone {
            url: self.url,
            result,
            scene: self.scene,
        }
    }
}

/// A material color map fetch
pub struct TextureJob {
    request: TextureRequest,
    source: Rc<dyn AssetSource>,
    scene: u64,
}

pub struct TextureDone {
    pub request: TextureRequest,
    pub result: ViewerResult<Texture>,
    scene: u64,
}

impl TextureJob {
    pub fn request(&self) -> &TextureRequest {
        &self.request
    }

    pub async fn run(self) -> TextureDone {
        let result = TextureLoader::new(self.source.as_ref()).load(&self.request.url).await;
        TextureDone {
            request: self.request,
            result,
            scene: self.scene,
        }
    }
}

/// A background image fetch
pub struct BackgroundJob {
    url: String,
    opacity: f32,
    source: Rc<dyn AssetSource>,
    scene: u64,
}

pub struct BackgroundDone {
    pub url: String,
    pub opacity: f32,
    pub result: ViewerResult<Texture>,
    scene: u64,
}

impl BackgroundJob {
    pub async fn run(self) -> BackgroundDone {
        let result = TextureLoader::new(self.source.as_ref()).load(&self.url).await;
        BackgroundDone {
            url: self.url,
            opacity: self.opacity,
            result,
            scene: self.scene,
        }
    }
}

/// What a dispatched command produced
#[derive(Debug)]
pub enum CommandOutcome {
    Done,
    /// PNG-encoded capture
    Screenshot(Vec<u8>),
    /// Texture fetches the host should run and hand back
    Textures(Vec<TextureJob>),
    /// The command failed; the failure has been logged and state is unchanged
    Ignored,
}

impl std::fmt::Debug for TextureJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureJob").field("request", &self.request).finish()
    }
}

pub struct SceneContext {
    config: ViewerConfig,
    container: Option<Box<dyn Container>>,
    graph: Option<SceneGraph>,
    renderer: Option<Box<dyn Renderer>>,
    renderer_factory: RendererFactory,
    camera: CameraManager,
    controls: ControlsManager,
    lights: Option<LightRig>,
    helpers: Option<HelperSet>,
    model: Option<ActiveModel>,
    mixer: Option<AnimationMixer>,
    actions: Vec<ActionId>,
    materials: MaterialRegistry,
    animation: AnimationController,
    loaders: Rc<LoaderRegistry>,
    source: Rc<dyn AssetSource>,
    render_loop: RenderLoop,
    last_stats: FrameStats,
    events: EventBus,
    /// Bumped for every scene build so late async results can be recognized
    scene: u64,
}

impl SceneContext {
    /// Creates an unmounted context reading assets from the local filesystem
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            camera: CameraManager::new(config.camera.clone()),
            controls: ControlsManager::new(config.controls.clone()),
            config,
            container: None,
            graph: None,
            renderer: None,
            renderer_factory: headless_factory(),
            lights: None,
            helpers: None,
            model: None,
            mixer: None,
            actions: Vec::new(),
            materials: MaterialRegistry::new(),
            animation: AnimationController::new(),
            loaders: Rc::new(LoaderRegistry::with_defaults()),
            source: Rc::new(FileSource::new()),
            render_loop: RenderLoop::default(),
            last_stats: FrameStats::default(),
            events: EventBus::new(),
            scene: 0,
        }
    }

    pub fn with_source(mut self, source: impl AssetSource + 'static) -> Self {
        self.source = Rc::new(source);
        self
    }

    pub fn with_renderer_factory(mut self, factory: RendererFactory) -> Self {
        self.renderer_factory = factory;
        self
    }

    /// Replaces the format loaders, e.g. to add FBX or DAE support
    pub fn with_loader_registry(mut self, registry: LoaderRegistry) -> Self {
        self.loaders = Rc::new(registry);
        self
    }

    /// Attaches the element the viewer draws into
    pub fn mount(&mut self, container: Box<dyn Container>) {
        if self.container.is_some() {
            warn!("Replacing mounted container");
        }
        self.container = Some(container);
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SceneEvent) + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn container(&self) -> Option<&dyn Container> {
        self.container.as_deref()
    }

    pub fn graph(&self) -> Option<&SceneGraph> {
        self.graph.as_ref()
    }

    pub fn renderer(&self) -> Option<&dyn Renderer> {
        self.renderer.as_deref()
    }

    pub fn camera(&self) -> &CameraManager {
        &self.camera
    }

    pub fn controls(&self) -> &ControlsManager {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut ControlsManager {
        &mut self.controls
    }

    pub fn lights(&self) -> Option<&LightRig> {
        self.lights.as_ref()
    }

    pub fn helpers(&self) -> Option<&HelperSet> {
        self.helpers.as_ref()
    }

    pub fn model(&self) -> Option<&ActiveModel> {
        self.model.as_ref()
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn animation(&self) -> &AnimationController {
        &self.animation
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    /// Builds the whole scene and loads the first model
    ///
    /// Stages run in order: scene graph, renderer, camera, controls, lights,
    /// helpers, model, material extraction, render loop. When any stage fails
    /// everything created so far is torn down and the error is returned.
    ///
    /// # Arguments
    /// * `url` - Model to load; its extension selects the format loader
    ///
    /// # Returns
    /// The token to pass to [`SceneContext::frame`]
    pub async fn init_scene(&mut self, url: &str) -> ViewerResult<LoopToken> {
        if self.container.is_none() {
            error!("Cannot initialize scene without a container");
            return Err(ViewerError::ContainerMissing);
        }
        if self.is_initialized() {
            warn!("Scene already initialized, rebuilding");
            self.dispose();
        }

        match self.build_scene(url).await {
            Ok(token) => Ok(token),
            Err(e) => {
                error!("Scene initialization failed: {}", e);
                self.dispose();
                Err(e)
            }
        }
    }

    async fn build_scene(&mut self, url: &str) -> ViewerResult<LoopToken> {
        self.scene += 1;
        let container = self.container.as_deref_mut().ok_or(ViewerError::ContainerMissing)?;

        let mut graph = SceneGraph::new();
        let (width, height) = container.size();
        let renderer = (self.renderer_factory)(container, &self.config.renderer)?;
        let canvas = renderer.canvas();
        self.renderer = Some(renderer);

        self.camera.create(width as f32 / height as f32)?;
        self.controls.create(self.camera.camera(), canvas)?;

        let mut lights = LightRig::build(&self.config.lights, &mut graph);
        lights.attach(&mut graph);
        self.lights = Some(lights);

        self.helpers = Some(HelperSet::build(&self.config.helper, &mut graph, container));
        self.graph = Some(graph);

        let background = self.config.background.clone();
        if let Some(job) = self.set_background(&background)? {
            let done = job.run().await;
            if let Err(e) = self.finish_background(done) {
                warn!("Keeping default background: {}", e);
            }
        }

        self.load_model(url).await?;

        let token = self.render_loop.start();
        info!("Scene initialized ({}x{})", width, height);
        Ok(token)
    }

    /// Prepares a model fetch against the current scene
    pub fn model_job(&self, url: &str) -> ModelJob {
        ModelJob {
            url: url.to_string(),
            options: self.config.loader.clone(),
            registry: self.loaders.clone(),
            source: self.source.clone(),
            scene: self.scene,
        }
    }

    /// Fetches a model and replaces the active one
    ///
    /// On failure the previous model stays in place.
    pub async fn load_model(&mut self, url: &str) -> ViewerResult<()> {
        if !self.is_initialized() {
            return Err(ViewerError::uninitialized("scene"));
        }
        let job = self.model_job(url);
        let events = &mut self.events;
        let done = job.run(&mut |ratio| events.emit(SceneEvent::LoadProgress(ratio))).await;
        self.install_model(done)
    }

    /// Applies a finished model fetch, disposing the previous model first
    pub fn install_model(&mut self, done: ModelDone) -> ViewerResult<()> {
        if done.scene != self.scene || !self.is_initialized() {
            debug!("Discarding model {} for a disposed scene", done.url);
            return Err(ViewerError::uninitialized("scene"));
        }
        let loaded = match done.result {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Failed to load model {}: {}", done.url, e);
                self.events.emit(SceneEvent::ModelFailed {
                    url: done.url,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        self.clear_model();
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        let result = install(graph, loaded);
        graph.add_to_root(result.model.root);

        self.materials.extract(graph, result.model.root);
        if self.config.model.wireframe {
            self.materials.update_all(graph, MaterialProperty::Wireframe(true))?;
        }

        let meshes = graph.meshes_under(result.model.root).len();
        let clips = result.model.clips.len();
        info!("Model {} installed ({} meshes, {} clips)", result.model.url, meshes, clips);
        self.events.emit(SceneEvent::ModelLoaded {
            url: result.model.url.clone(),
            meshes,
            clips,
        });
        self.events.emit(SceneEvent::MaterialsChanged(self.materials.len()));

        self.model = Some(result.model);
        self.mixer = Some(result.mixer);
        self.actions = result.actions;
        Ok(())
    }

    fn clear_model(&mut self) {
        self.animation.clear();
        self.mixer = None;
        self.actions.clear();
        if let Some(graph) = self.graph.as_mut() {
            self.materials.deselect(graph);
            if let Some(model) = self.model.take() {
                model.dispose(graph);
            }
        }
        self.materials.clear();
    }

    /// Runs one frame: controls, animation, stats, then rendering
    ///
    /// Returns `false` once `token` is stale or the scene is gone; the host
    /// should stop scheduling frames at that point.
    pub fn frame(&mut self, token: LoopToken, delta: f32) -> bool {
        if !self.render_loop.is_live(token) {
            return false;
        }
        let (Some(graph), Some(camera), Some(renderer)) =
            (self.graph.as_mut(), self.camera.camera_mut(), self.renderer.as_mut())
        else {
            return false;
        };

        self.controls.update(camera);
        if let Some(mixer) = self.mixer.as_mut() {
            self.animation.update(mixer, graph, delta);
        }
        if let (Some(helpers), Some(container)) = (self.helpers.as_mut(), self.container.as_deref_mut()) {
            let frame_time = Duration::try_from_secs_f32(delta).unwrap_or_default();
            helpers.tick_stats(
                container,
                frame_time,
                self.last_stats.draw_calls,
                self.last_stats.vertex_count,
            );
        }
        self.last_stats = renderer.render(graph, camera);
        true
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Restores the configured camera pose and clears controls motion
    pub fn reset_view(&mut self) -> bool {
        let reset = self.camera.reset();
        if reset {
            self.controls.reset();
        }
        reset
    }

    /// Re-reads the container size into camera and renderer
    pub fn resize(&mut self) {
        let Some(container) = self.container.as_deref() else {
            return;
        };
        let (width, height) = container.size();
        if width == 0 || height == 0 {
            debug!("Ignoring resize to {}x{}", width, height);
            return;
        }
        self.camera.update_aspect(width as f32 / height as f32);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_size(width, height);
        }
    }

    /// Renders the current view and encodes it as PNG
    pub fn take_screenshot(&mut self) -> ViewerResult<Vec<u8>> {
        let graph = self.graph.as_ref().ok_or(ViewerError::uninitialized("scene"))?;
        let camera = self.camera.camera().ok_or(ViewerError::uninitialized("camera"))?;
        let renderer = self.renderer.as_mut().ok_or(ViewerError::uninitialized("renderer"))?;

        let image = renderer.capture(graph, camera).map_err(ViewerError::Screenshot)?;
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ViewerError::Screenshot(e.into()))?;
        info!("Screenshot captured ({} bytes)", bytes.len());
        self.events.emit(SceneEvent::ScreenshotTaken { bytes: bytes.len() });
        Ok(bytes)
    }

    /// Applies a background description
    ///
    /// Colors apply immediately. Images return a job; the previous
    /// background stays until the job's result is handed to
    /// [`SceneContext::finish_background`].
    pub fn set_background(&mut self, background: &BackgroundConfig) -> ViewerResult<Option<BackgroundJob>> {
        if !self.is_initialized() {
            return Err(ViewerError::uninitialized("scene"));
        }
        match background.kind {
            BackgroundKind::Color => {
                let color: Color = background
                    .value
                    .parse()
                    .map_err(|e: crate::gfx::color::ParseColorError| {
                        ViewerError::invalid_property("background", e.to_string())
                    })?;
                self.apply_background(Background::Color {
                    color,
                    opacity: background.opacity,
                });
                Ok(None)
            }
            BackgroundKind::Image => Ok(Some(BackgroundJob {
                url: background.value.clone(),
                opacity: background.opacity,
                source: self.source.clone(),
                scene: self.scene,
            })),
        }
    }

    pub fn update_background_color(&mut self, color: Color) -> ViewerResult<()> {
        let opacity = match self.graph.as_ref().map(|g| g.background) {
            Some(Background::Color { opacity, .. }) | Some(Background::Image { opacity, .. }) => opacity,
            None => return Err(ViewerError::uninitialized("scene")),
        };
        self.apply_background(Background::Color { color, opacity });
        Ok(())
    }

    /// Applies a finished background image fetch
    pub fn finish_background(&mut self, done: BackgroundDone) -> ViewerResult<()> {
        if done.scene != self.scene || !self.is_initialized() {
            debug!("Discarding background {} for a disposed scene", done.url);
            return Err(ViewerError::uninitialized("scene"));
        }
        let mut texture = match done.result {
            Ok(texture) => texture,
            Err(e) => {
                error!("Failed to load background {}: {}", done.url, e);
                return Err(e);
            }
        };
        texture.color_space = crate::gfx::resources::texture::ColorSpace::Srgb;
        let Some(graph) = self.graph.as_mut() else {
            return Err(ViewerError::uninitialized("scene"));
        };
        let id = graph.add_texture(texture);
        self.apply_background(Background::Image {
            texture: id,
            opacity: done.opacity,
        });
        Ok(())
    }

    fn apply_background(&mut self, background: Background) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let previous = std::mem::replace(&mut graph.background, background);
        if let Background::Image { texture, .. } = previous {
            if background != previous && !graph.texture_in_use(texture) {
                graph.dispose_texture(texture);
            }
        }
        self.events.emit(SceneEvent::BackgroundChanged);
    }

    pub fn toggle_helper(&mut self, helper: HelperName, show: bool) -> ViewerResult<()> {
        let helpers = self.helpers.as_mut().ok_or(ViewerError::uninitialized("helpers"))?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        match helper {
            HelperName::Grid => {
                helpers.toggle_grid(graph, show);
            }
            HelperName::Axes => {
                helpers.toggle_axes(graph, show);
            }
            HelperName::Floor => {
                helpers.toggle_floor(graph, show);
            }
            HelperName::Stats => {
                let container = self.container.as_deref_mut().ok_or(ViewerError::ContainerMissing)?;
                helpers.toggle_stats(container, show);
            }
        }
        self.events.emit(SceneEvent::HelperToggled { helper, shown: show });
        Ok(())
    }

    pub fn update_floor_color(&mut self, color: Color) -> ViewerResult<()> {
        let (helpers, graph) = self.helpers_and_graph()?;
        helpers.update_floor_color(graph, color)
    }

    pub fn update_floor_opacity(&mut self, opacity: f32) -> ViewerResult<()> {
        let (helpers, graph) = self.helpers_and_graph()?;
        helpers.update_floor_opacity(graph, opacity)
    }

    pub fn update_grid_color(&mut self, color: Color) -> ViewerResult<()> {
        let (helpers, graph) = self.helpers_and_graph()?;
        helpers.update_grid_color(graph, color)
    }

    fn helpers_and_graph(&mut self) -> ViewerResult<(&mut HelperSet, &mut SceneGraph)> {
        let helpers = self.helpers.as_mut().ok_or(ViewerError::uninitialized("helpers"))?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        Ok((helpers, graph))
    }

    fn lights_and_graph(&mut self) -> ViewerResult<(&mut LightRig, &mut SceneGraph)> {
        let lights = self.lights.as_mut().ok_or(ViewerError::uninitialized("lights"))?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        Ok((lights, graph))
    }

    /// Changes one light property from host strings and a JSON value
    pub fn update_light(&mut self, role: &str, property: &str, value: &serde_json::Value) -> ViewerResult<()> {
        let parsed: LightRole = role.parse()?;
        let (lights, graph) = self.lights_and_graph()?;
        lights.apply_change(graph, role, property, value)?;
        self.events.emit(SceneEvent::LightChanged(parsed));
        Ok(())
    }

    /// Places a light on its orbit sphere by angles `x` and `y` in degrees
    pub fn set_light_angle(&mut self, role: LightRole, x: f32, y: f32, z: f32) -> ViewerResult<()> {
        let (lights, graph) = self.lights_and_graph()?;
        lights.set_light_angle(graph, role, x, y, z)?;
        self.events.emit(SceneEvent::LightChanged(role));
        Ok(())
    }

    /// Changes one property on a named material, or every material for `all`
    ///
    /// A map URL yields texture jobs for the host to run.
    pub fn update_material(
        &mut self,
        name: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> ViewerResult<Vec<TextureJob>> {
        let property = MaterialProperty::from_json(property, value)?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        let requests = match Target::from(name) {
            Target::All => self.materials.update_all(graph, property)?,
            Target::Name(name) => self
                .materials
                .update_property(graph, &name, property)?
                .into_iter()
                .collect(),
        };
        Ok(requests
            .into_iter()
            .map(|request| TextureJob {
                request,
                source: self.source.clone(),
                scene: self.scene,
            })
            .collect())
    }

    /// Applies a finished texture fetch; stale or superseded results are dropped
    pub fn finish_texture(&mut self, done: TextureDone) -> bool {
        let Some(graph) = self.graph.as_mut().filter(|_| done.scene == self.scene) else {
            debug!("Discarding texture {} for a disposed scene", done.request.url);
            return false;
        };
        match done.result {
            Ok(texture) => self.materials.apply_texture(graph, &done.request, texture),
            Err(e) => {
                self.materials.texture_failed(&done.request, &e);
                false
            }
        }
    }

    /// Highlights a material, or clears the highlight for `None`
    pub fn select_material(&mut self, name: Option<&str>) -> ViewerResult<()> {
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        match name {
            Some(name) => self.materials.select(graph, name)?,
            None => self.materials.deselect(graph),
        }
        self.events
            .emit(SceneEvent::MaterialSelected(self.materials.selected().map(str::to_string)));
        Ok(())
    }

    pub fn convert_material(&mut self, target: &str, kind: MaterialKind) -> ViewerResult<()> {
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        self.materials.convert_type(graph, Target::from(target), kind)?;
        self.events.emit(SceneEvent::MaterialsChanged(self.materials.len()));
        Ok(())
    }

    pub fn start_animation(&mut self) -> ViewerResult<()> {
        let mixer = self.mixer.as_mut().ok_or(ViewerError::uninitialized("animation mixer"))?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        self.animation.start(mixer, &self.actions, graph);
        self.events.emit(SceneEvent::AnimationState(self.animation.state()));
        Ok(())
    }

    pub fn pause_animation(&mut self) -> ViewerResult<()> {
        let mixer = self.mixer.as_mut().ok_or(ViewerError::uninitialized("animation mixer"))?;
        self.animation.pause(mixer);
        self.events.emit(SceneEvent::AnimationState(self.animation.state()));
        Ok(())
    }

    pub fn reset_animation(&mut self) -> ViewerResult<()> {
        let mixer = self.mixer.as_mut().ok_or(ViewerError::uninitialized("animation mixer"))?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        self.animation.reset(mixer, graph);
        self.events.emit(SceneEvent::AnimationState(self.animation.state()));
        Ok(())
    }

    fn model_and_graph(&mut self) -> ViewerResult<(&ActiveModel, &mut SceneGraph)> {
        let model = self.model.as_ref().ok_or(ViewerError::uninitialized("model"))?;
        let graph = self.graph.as_mut().ok_or(ViewerError::uninitialized("scene"))?;
        Ok((model, graph))
    }

    pub fn set_model_scale(&mut self, scale: f32) -> ViewerResult<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewerError::invalid_property("scale", format!("{scale} must be positive")));
        }
        let (model, graph) = self.model_and_graph()?;
        model.update_scale(graph, scale);
        Ok(())
    }

    pub fn set_model_position(&mut self, position: Position) -> ViewerResult<()> {
        let (model, graph) = self.model_and_graph()?;
        model.update_position(graph, position.x, position.y, position.z);
        Ok(())
    }

    /// Euler angles in radians
    pub fn set_model_rotation(&mut self, rotation: Position) -> ViewerResult<()> {
        let (model, graph) = self.model_and_graph()?;
        model.update_rotation(graph, rotation.x, rotation.y, rotation.z);
        Ok(())
    }

    /// Routes a host command to the matching operation
    ///
    /// Failures are logged and reported as [`CommandOutcome::Ignored`];
    /// they never disturb the rest of the scene.
    pub fn dispatch(&mut self, command: SceneCommand) -> CommandOutcome {
        debug!("Dispatching {:?}", command);
        let result = match command {
            SceneCommand::ResetView => {
                if self.reset_view() {
                    Ok(CommandOutcome::Done)
                } else {
                    Err(ViewerError::uninitialized("camera"))
                }
            }
            SceneCommand::TakeScreenshot => self.take_screenshot().map(CommandOutcome::Screenshot),
            SceneCommand::StartAnimation => self.start_animation().map(|_| CommandOutcome::Done),
            SceneCommand::PauseAnimation => self.pause_animation().map(|_| CommandOutcome::Done),
            SceneCommand::ResetAnimation => self.reset_animation().map(|_| CommandOutcome::Done),
            SceneCommand::ToggleGrid(show) => self.toggle_helper(HelperName::Grid, show).map(|_| CommandOutcome::Done),
            SceneCommand::ToggleStats(show) => self.toggle_helper(HelperName::Stats, show).map(|_| CommandOutcome::Done),
            SceneCommand::ToggleAxes(show) => self.toggle_helper(HelperName::Axes, show).map(|_| CommandOutcome::Done),
            SceneCommand::ToggleFloor(show) => self.toggle_helper(HelperName::Floor, show).map(|_| CommandOutcome::Done),
            SceneCommand::UpdateFloorColor(color) => self.update_floor_color(color).map(|_| CommandOutcome::Done),
            SceneCommand::UpdateFloorOpacity(opacity) => {
                self.update_floor_opacity(opacity).map(|_| CommandOutcome::Done)
            }
            SceneCommand::UpdateGridColor(color) => self.update_grid_color(color).map(|_| CommandOutcome::Done),
            SceneCommand::UpdateBackgroundColor(color) => {
                self.update_background_color(color).map(|_| CommandOutcome::Done)
            }
            SceneCommand::ScaleChange(scale) => self.set_model_scale(scale).map(|_| CommandOutcome::Done),
            SceneCommand::LightChange {
                light_type,
                property,
                value,
            } => self
                .update_light(&light_type, &property, &value)
                .map(|_| CommandOutcome::Done),
            SceneCommand::MaterialChange { name, property, value } => {
                self.update_material(&name, &property, &value).map(|jobs| {
                    if jobs.is_empty() {
                        CommandOutcome::Done
                    } else {
                        CommandOutcome::Textures(jobs)
                    }
                })
            }
            SceneCommand::SelectMaterial(name) => self.select_material(name.as_deref()).map(|_| CommandOutcome::Done),
            SceneCommand::ConvertMaterial { target, kind } => {
                self.convert_material(&target, kind).map(|_| CommandOutcome::Done)
            }
            SceneCommand::UpdateModelPosition(position) => {
                self.set_model_position(position).map(|_| CommandOutcome::Done)
            }
            SceneCommand::UpdateModelRotation(rotation) => {
                self.set_model_rotation(rotation).map(|_| CommandOutcome::Done)
            }
        };
        result.unwrap_or_else(|e| {
            warn!("Command failed: {}", e);
            CommandOutcome::Ignored
        })
    }

    /// [`SceneContext::dispatch`], then runs and applies any texture jobs
    pub async fn dispatch_and_wait(&mut self, command: SceneCommand) -> CommandOutcome {
        match self.dispatch(command) {
            CommandOutcome::Textures(jobs) => {
                for job in jobs {
                    let done = job.run().await;
                    self.finish_texture(done);
                }
                CommandOutcome::Done
            }
            other => other,
        }
    }

    /// Stops the loop and releases everything the scene created
    ///
    /// Safe to call more than once and on a partially built scene. The
    /// container stays mounted so the context can be initialized again.
    pub fn dispose(&mut self) {
        let was_live = self.graph.is_some() || self.renderer.is_some();
        self.render_loop.stop();
        self.clear_model();

        if let Some(graph) = self.graph.as_mut() {
            if let (Some(mut helpers), Some(container)) = (self.helpers.take(), self.container.as_deref_mut()) {
                helpers.dispose(graph, container);
            }
            if let Some(lights) = self.lights.take() {
                lights.dispose(graph);
            }
        }
        self.helpers = None;
        self.lights = None;

        self.controls.dispose();
        self.camera.dispose();

        if let Some(mut renderer) = self.renderer.take() {
            renderer.force_context_loss();
            if let Some(container) = self.container.as_deref_mut() {
                container.remove_element(renderer.canvas());
            }
        }
        if let Some(mut graph) = self.graph.take() {
            graph.clear();
        }
        self.last_stats = FrameStats::default();

        if was_live {
            info!("Scene disposed");
            self.events.emit(SceneEvent::Disposed);
        }
    }
}

impl Drop for SceneContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SceneEvent;
    use crate::loader::source::MemorySource;
    use crate::surface::{ElementKind, HeadlessContainer};
    use futures::executor::block_on;
    use std::cell::RefCell;

    const TRIANGLE_OBJ: &str = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn context() -> SceneContext {
        let source = MemorySource::new()
            .with_asset("tri.obj", TRIANGLE_OBJ.as_bytes().to_vec())
            .with_asset("other.obj", TRIANGLE_OBJ.as_bytes().to_vec());
        let mut ctx = SceneContext::new(ViewerConfig::default()).with_source(source);
        ctx.mount(Box::new(HeadlessContainer::new(400, 300)));
        ctx
    }

    #[test]
    fn test_render_loop_tokens() {
        let mut render_loop = RenderLoop::default();
        let first = render_loop.start();
        assert!(render_loop.is_live(first));
        render_loop.stop();
        assert!(!render_loop.is_live(first));
        let second = render_loop.start();
        assert!(!render_loop.is_live(first));
        assert!(render_loop.is_live(second));
    }

    #[test]
    fn test_init_requires_container() {
        let mut ctx = SceneContext::new(ViewerConfig::default());
        let result = block_on(ctx.init_scene("tri.obj"));
        assert!(matches!(result, Err(ViewerError::ContainerMissing)));
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_init_builds_scene() {
        let mut ctx = context();
        let token = block_on(ctx.init_scene("tri.obj")).unwrap();

        assert!(ctx.is_initialized());
        assert!(ctx.camera().camera().is_some());
        assert!(ctx.controls().controls().is_some());
        assert!(ctx.lights().unwrap().is_attached());
        assert!(ctx.model().is_some());
        assert_eq!(ctx.materials().len(), 1);
        assert_eq!(ctx.container().unwrap().count(ElementKind::Canvas), 1);

        assert!(ctx.frame(token, 1.0 / 60.0));
        assert_eq!(ctx.renderer().unwrap().frames_rendered(), 1);
    }

    #[test]
    fn test_failed_init_cleans_up() {
        let mut ctx = context();
        let result = block_on(ctx.init_scene("missing.obj"));
        assert!(matches!(result, Err(ViewerError::AssetLoadError { .. })));
        assert!(!ctx.is_initialized());
        assert!(ctx.camera().camera().is_none());
        assert!(ctx.controls().controls().is_none());
        assert_eq!(ctx.container().unwrap().count(ElementKind::Canvas), 0);
        assert_eq!(ctx.container().unwrap().count(ElementKind::StatsOverlay), 0);
        assert!(!ctx.render_loop().is_running());
    }

    #[test]
    fn test_failed_reload_keeps_previous_model() {
        let mut ctx = context();
        block_on(ctx.init_scene("tri.obj")).unwrap();
        let root = ctx.model().unwrap().root;

        assert!(block_on(ctx.load_model("nope.obj")).is_err());
        assert_eq!(ctx.model().unwrap().root, root);
        assert!(block_on(ctx.load_model("model.xyz")).is_err());
        assert_eq!(ctx.materials().len(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut ctx = context();
        let disposed = Rc::new(RefCell::new(0));
        let counter = disposed.clone();
        ctx.subscribe(move |e| {
            if *e == SceneEvent::Disposed {
                *counter.borrow_mut() += 1;
            }
        });

        let token = block_on(ctx.init_scene("tri.obj")).unwrap();
        ctx.dispose();
        ctx.dispose();

        assert_eq!(*disposed.borrow(), 1);
        assert!(!ctx.frame(token, 0.016));
        assert!(ctx.container().unwrap().elements().is_empty());
        assert!(ctx.model().is_none());
    }

    #[test]
    fn test_late_texture_discarded_after_dispose() {
        let mut ctx = context();
        block_on(ctx.init_scene("tri.obj")).unwrap();
        let name = ctx.materials().selected().map(str::to_string);
        assert!(name.is_none());

        let jobs = ctx
            .update_material("all", "map", &serde_json::json!("missing.png"))
            .unwrap();
        assert_eq!(jobs.len(), 1);
        let done = block_on(jobs.into_iter().next().unwrap().run());
        ctx.dispose();
        assert!(!ctx.finish_texture(done));
    }

    #[test]
    fn test_dispatch_logs_failures() {
        let mut ctx = context();
        assert!(matches!(ctx.dispatch(SceneCommand::ToggleGrid(true)), CommandOutcome::Ignored));

        block_on(ctx.init_scene("tri.obj")).unwrap();
        assert!(matches!(ctx.dispatch(SceneCommand::ToggleGrid(true)), CommandOutcome::Done));
        assert!(matches!(
            ctx.dispatch(SceneCommand::UpdateFloorOpacity(2.0)),
            CommandOutcome::Ignored
        ));
        assert!(matches!(ctx.dispatch(SceneCommand::ScaleChange(2.0)), CommandOutcome::Done));
        assert!(matches!(
            ctx.dispatch(SceneCommand::TakeScreenshot),
            CommandOutcome::Screenshot(bytes) if bytes.starts_with(&[0x89, b'P', b'N', b'G'])
        ));
    }
}
