//! # Model loading
//!
//! Classifies a model URL, fetches its bytes through an [`AssetSource`],
//! parses them with a registered [`FormatLoader`] and normalizes the result
//! into a placed [`LoadedModel`]. Nothing here touches a scene graph until
//! [`install`] is called with a finished model.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use model_viewer::loader::{install, load_model, LoaderOptions, LoaderRegistry};
//! use model_viewer::loader::source::FileSource;
//! use model_viewer::gfx::scene::SceneGraph;
//!
//! let registry = LoaderRegistry::with_defaults();
//! let source = FileSource::new();
//! let mut graph = SceneGraph::new();
//!
//! let loaded = pollster::block_on(load_model(
//!     "assets/helmet.glb",
//!     &LoaderOptions::default(),
//!     &registry,
//!     &source,
//!     &mut |ratio| println!("{:.0}%", ratio * 100.0),
//! ))?;
//! let result = install(&mut graph, loaded);
//! graph.add_to_root(result.model.root);
//! # Ok::<(), model_viewer::ViewerError>(())
//! ```

pub mod asset;
pub mod gltf;
pub mod install;
pub mod obj;
pub mod source;
pub mod stl;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ViewerError, ViewerResult};

pub use asset::{
    AssetMaterial, AssetMesh, AssetNode, AssetScene, LoadedModel, NormalizeOptions, Placement,
    RawAsset,
};
pub use install::{install, ActiveModel, LoadResult};
use source::{AssetSource, LoadProgress};

/// Model formats the viewer knows how to route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFileType {
    Fbx,
    Gltf,
    Glb,
    Obj,
    Stl,
    Dae,
    Unknown,
}

impl ModelFileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "fbx" => ModelFileType::Fbx,
            "gltf" => ModelFileType::Gltf,
            "glb" => ModelFileType::Glb,
            "obj" => ModelFileType::Obj,
            "stl" => ModelFileType::Stl,
            "dae" => ModelFileType::Dae,
            _ => ModelFileType::Unknown,
        }
    }
}

impl fmt::Display for ModelFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFileType::Fbx => "FBX",
            ModelFileType::Gltf => "GLTF",
            ModelFileType::Glb => "GLB",
            ModelFileType::Obj => "OBJ",
            ModelFileType::Stl => "STL",
            ModelFileType::Dae => "DAE",
            ModelFileType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies a URL by the extension of its path part
pub fn classify_file_type(url: &str) -> ModelFileType {
    let path = source::url_path(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ModelFileType::from_extension(ext),
        None => ModelFileType::Unknown,
    }
}

/// Draco mesh decompression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DracoOptions {
    pub decoder_path: String,
}

impl Default for DracoOptions {
    fn default() -> Self {
        Self {
            decoder_path: "/draco/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Request Draco decompression for GLTF/GLB
    pub draco: Option<DracoOptions>,
    /// Largest dimension after placement; `None` keeps the model's own scale
    pub target_size: Option<f32>,
    /// Generate mipmaps and trilinear filtering for loaded textures
    pub texture_compression: bool,
    /// Recompute normals and bounds for every mesh
    pub optimize_geometry: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            draco: None,
            target_size: Some(100.0),
            texture_compression: false,
            optimize_geometry: false,
        }
    }
}

impl LoaderOptions {
    pub fn with_draco(mut self, decoder_path: &str) -> Self {
        self.draco = Some(DracoOptions {
            decoder_path: decoder_path.to_string(),
        });
        self
    }

    pub fn with_target_size(mut self, target_size: Option<f32>) -> Self {
        self.target_size = target_size;
        self
    }

    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            target_size: self.target_size,
            optimize_geometry: self.optimize_geometry,
            texture_compression: self.texture_compression,
        }
    }
}

/// What a format loader knows about the asset it is parsing
#[derive(Debug, Clone)]
pub struct LoadContext {
    pub url: String,
    pub file_type: ModelFileType,
    /// Directory used to resolve external buffers and images
    pub base_dir: Option<PathBuf>,
    pub draco: Option<DracoOptions>,
}

impl LoadContext {
    /// File name without extension, used to name bare geometry
    pub fn stem(&self) -> String {
        let path = source::url_path(&self.url);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _)| stem)
            .to_string()
    }
}

/// Parser for one model format
pub trait FormatLoader {
    fn name(&self) -> &'static str;

    /// Checks the loader can honor `options` before any bytes are fetched
    fn prepare(&self, _options: &LoaderOptions) -> Result<(), String> {
        Ok(())
    }

    fn parse(&self, bytes: &[u8], ctx: &LoadContext) -> anyhow::Result<RawAsset>;
}

/// Format loaders keyed by file type
///
/// GLTF/GLB, OBJ and STL are built in. FBX and DAE have no bundled parser;
/// hosts register one with [`LoaderRegistry::register`].
pub struct LoaderRegistry {
    loaders: HashMap<ModelFileType, Box<dyn FormatLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ModelFileType::Gltf, Box::new(self::gltf::GltfLoader));
        registry.register(ModelFileType::Glb, Box::new(self::gltf::GltfLoader));
        registry.register(ModelFileType::Obj, Box::new(obj::ObjLoader));
        registry.register(ModelFileType::Stl, Box::new(stl::StlLoader));
        registry
    }

    /// Registers or replaces the loader for `file_type`
    pub fn register(&mut self, file_type: ModelFileType, loader: Box<dyn FormatLoader>) {
        debug!("Registered {} loader for {}", loader.name(), file_type);
        self.loaders.insert(file_type, loader);
    }

    pub fn supports(&self, file_type: ModelFileType) -> bool {
        self.loaders.contains_key(&file_type)
    }

    pub fn loader_for(
        &self,
        file_type: ModelFileType,
        options: &LoaderOptions,
    ) -> ViewerResult<&dyn FormatLoader> {
        let loader = self
            .loaders
            .get(&file_type)
            .ok_or_else(|| ViewerError::LoaderInitError {
                file_type,
                reason: format!("no loader registered for {file_type} files"),
            })?;
        loader
            .prepare(options)
            .map_err(|reason| ViewerError::LoaderInitError { file_type, reason })?;
        Ok(loader.as_ref())
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Fetches, parses and normalizes a model without touching any scene
///
/// # Arguments
/// * `progress` - Receives a non-decreasing ratio in `[0, 1]`; only called
///   when the source knows the total size
pub async fn load_model(
    url: &str,
    options: &LoaderOptions,
    registry: &LoaderRegistry,
    source: &dyn AssetSource,
    progress: &mut dyn FnMut(f32),
) -> ViewerResult<LoadedModel> {
    let file_type = classify_file_type(url);
    if file_type == ModelFileType::Unknown {
        return Err(ViewerError::UnsupportedFormat {
            url: url.to_string(),
        });
    }
    let loader = registry.loader_for(file_type, options)?;

    let mut last_ratio = 0.0f32;
    let mut on_progress = |p: LoadProgress| {
        if let Some(ratio) = p.ratio() {
            if ratio >= last_ratio {
                last_ratio = ratio;
                progress(ratio);
            }
        }
    };
    let bytes = source
        .fetch(url, &mut on_progress)
        .await
        .map_err(|source| ViewerError::AssetLoadError {
            url: url.to_string(),
            source,
        })?;

    let ctx = LoadContext {
        url: url.to_string(),
        file_type,
        base_dir: source::base_dir(url),
        draco: options.draco.clone(),
    };
    let raw = loader
        .parse(&bytes, &ctx)
        .map_err(|source| ViewerError::AssetLoadError {
            url: url.to_string(),
            source,
        })?;

    let model = asset::normalize(raw, url, file_type, options.normalize_options());
    info!(
        "Loaded {} model {} ({} meshes, {} clips, scale {:.3})",
        file_type,
        url,
        model.scene.root.mesh_count(),
        model.scene.animations.len(),
        model.placement.scale
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;
    use crate::loader::source::MemorySource;
    use anyhow::bail;

    struct FakeFbx {
        fail: bool,
    }

    impl FormatLoader for FakeFbx {
        fn name(&self) -> &'static str {
            "fake-fbx"
        }

        fn parse(&self, _bytes: &[u8], _ctx: &LoadContext) -> anyhow::Result<RawAsset> {
            if self.fail {
                bail!("corrupt file");
            }
            let mut root = AssetNode::group("fbx");
            root.children.push(AssetNode::with_mesh(
                "body",
                AssetMesh {
                    geometry: generate_cube(),
                    material: None,
                },
            ));
            Ok(RawAsset::Group(AssetScene {
                root,
                ..Default::default()
            }))
        }
    }

    #[test]
    fn test_classify_file_type() {
        assert_eq!(classify_file_type("a/b/Model.GLB"), ModelFileType::Glb);
        assert_eq!(classify_file_type("scene.gltf?v=3#x"), ModelFileType::Gltf);
        assert_eq!(classify_file_type("file:///tmp/part.stl"), ModelFileType::Stl);
        assert_eq!(classify_file_type("rig.fbx"), ModelFileType::Fbx);
        assert_eq!(classify_file_type("old.dae"), ModelFileType::Dae);
        assert_eq!(classify_file_type("mesh.obj"), ModelFileType::Obj);
        assert_eq!(classify_file_type("model.xyz"), ModelFileType::Unknown);
        assert_eq!(classify_file_type("dir.v2/model"), ModelFileType::Unknown);
    }

    #[test]
    fn test_unknown_extension_fails_before_fetch() {
        let source = MemorySource::new();
        let registry = LoaderRegistry::with_defaults();
        let result = pollster::block_on(load_model(
            "model.xyz",
            &LoaderOptions::default(),
            &registry,
            &source,
            &mut |_| {},
        ));
        assert!(matches!(result, Err(ViewerError::UnsupportedFormat { .. })));
        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_fbx_without_loader_is_init_error() {
        let registry = LoaderRegistry::with_defaults();
        let result = registry.loader_for(ModelFileType::Fbx, &LoaderOptions::default());
        assert!(matches!(
            result,
            Err(ViewerError::LoaderInitError {
                file_type: ModelFileType::Fbx,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_draco_path_is_init_error() {
        let registry = LoaderRegistry::with_defaults();
        let options = LoaderOptions::default().with_draco("  ");
        assert!(matches!(
            registry.loader_for(ModelFileType::Glb, &options),
            Err(ViewerError::LoaderInitError { .. })
        ));
        assert!(registry
            .loader_for(ModelFileType::Glb, &LoaderOptions::default().with_draco("/draco/"))
            .is_ok());
    }

    #[test]
    fn test_registered_loader_and_progress() {
        let mut registry = LoaderRegistry::with_defaults();
        registry.register(ModelFileType::Fbx, Box::new(FakeFbx { fail: false }));
        let source = MemorySource::new().with_asset("rig.fbx", vec![0u8; 64]);

        let mut ratios = Vec::new();
        let model = pollster::block_on(load_model(
            "rig.fbx",
            &LoaderOptions::default(),
            &registry,
            &source,
            &mut |r| ratios.push(r),
        ))
        .unwrap();

        assert_eq!(ratios, vec![0.5, 1.0]);
        assert!(model.embedded_clips);
        assert!((model.bounds.max_dimension() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_progress_skipped_without_total() {
        let mut registry = LoaderRegistry::new();
        registry.register(ModelFileType::Fbx, Box::new(FakeFbx { fail: false }));
        let source = MemorySource::new().with_asset("rig.fbx", vec![0u8; 8]).without_total();
        let mut calls = 0;
        pollster::block_on(load_model(
            "rig.fbx",
            &LoaderOptions::default(),
            &registry,
            &source,
            &mut |_| calls += 1,
        ))
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_parse_failure_is_asset_load_error() {
        let mut registry = LoaderRegistry::new();
        registry.register(ModelFileType::Fbx, Box::new(FakeFbx { fail: true }));
        let source = MemorySource::new().with_asset("rig.fbx", vec![1, 2, 3]);
        let result = pollster::block_on(load_model(
            "rig.fbx",
            &LoaderOptions::default(),
            &registry,
            &source,
            &mut |_| {},
        ));
        assert!(matches!(result, Err(ViewerError::AssetLoadError { .. })));
    }

    #[test]
    fn test_context_stem() {
        let ctx = LoadContext {
            url: "file:///models/bracket.v2.stl?x=1".into(),
            file_type: ModelFileType::Stl,
            base_dir: None,
            draco: None,
        };
        assert_eq!(ctx.stem(), "bracket.v2");
    }
}
