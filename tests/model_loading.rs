mod common;

use model_viewer::config::ViewerConfig;
use model_viewer::error::ViewerError;
use model_viewer::loader::source::MemorySource;
use model_viewer::loader::{classify_file_type, load_model, LoaderOptions, LoaderRegistry, ModelFileType};

#[test]
fn test_classification_covers_supported_extensions() {
    let cases = [
        ("a.fbx", ModelFileType::Fbx),
        ("a.gltf", ModelFileType::Gltf),
        ("a.GLB", ModelFileType::Glb),
        ("dir/a.obj?v=2", ModelFileType::Obj),
        ("file:///tmp/a.stl", ModelFileType::Stl),
        ("a.dae#frag", ModelFileType::Dae),
        ("asset.xyz", ModelFileType::Unknown),
        ("noext", ModelFileType::Unknown),
    ];
    for (url, expected) in cases {
        assert_eq!(classify_file_type(url), expected, "{url}");
    }
}

#[test]
fn test_unknown_extension_never_fetches() {
    let source = MemorySource::new().with_asset("asset.xyz", vec![1, 2, 3]);
    let result = pollster::block_on(load_model(
        "asset.xyz",
        &LoaderOptions::default(),
        &LoaderRegistry::with_defaults(),
        &source,
        &mut |_| {},
    ));
    assert!(matches!(result, Err(ViewerError::UnsupportedFormat { .. })));
    assert_eq!(source.fetch_count(), 0);
}

#[test]
fn test_glb_rests_on_ground() {
    let source = common::source();
    let mut progress = Vec::new();
    let loaded = pollster::block_on(load_model(
        "model.glb",
        &LoaderOptions::default(),
        &LoaderRegistry::with_defaults(),
        &source,
        &mut |ratio| progress.push(ratio),
    ))
    .unwrap();

    assert!(loaded.bounds.min.y.abs() < 1e-4);
    assert!(loaded.bounds.center().x.abs() < 1e-4);
    assert!(loaded.bounds.center().z.abs() < 1e-4);
    assert!((loaded.bounds.max_dimension() - 100.0).abs() < 1e-3);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));
}

#[test]
fn test_installed_glb_bounds_in_scene() {
    let mut ctx = common::mounted(ViewerConfig::default());
    pollster::block_on(ctx.init_scene("model.glb")).unwrap();

    let graph = ctx.graph().unwrap();
    let model = ctx.model().unwrap();
    let bounds = graph.subtree_bounds(model.root);
    assert!(bounds.min.y.abs() < 1e-3);
    assert!(bounds.center().x.abs() < 1e-3);
    assert!(bounds.center().z.abs() < 1e-3);
    assert_eq!(model.clips.len(), 1);
}

#[test]
fn test_shared_material_is_one_entry() {
    let mut ctx = common::mounted(ViewerConfig::default());
    pollster::block_on(ctx.init_scene("model.glb")).unwrap();

    let entries = ctx.materials().entries(ctx.graph().unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Shared");
    assert_eq!(entries[0].mesh_names.len(), 2);
}

#[test]
fn test_reload_disposes_previous_model() {
    let mut ctx = common::mounted(ViewerConfig::default());
    pollster::block_on(ctx.init_scene("model.glb")).unwrap();
    let first = ctx.model().unwrap();
    let old_root = first.root;
    let old_materials = first.material_ids().to_vec();
    let old_geometries = first.geometry_ids().to_vec();

    pollster::block_on(ctx.load_model("wedge.stl")).unwrap();

    let graph = ctx.graph().unwrap();
    assert!(!graph.contains(old_root));
    assert!(old_materials.iter().all(|id| graph.material(*id).is_none()));
    assert!(old_geometries.iter().all(|id| graph.geometry(*id).is_none()));
    assert_eq!(ctx.model().unwrap().file_type, ModelFileType::Stl);
    assert_eq!(ctx.materials().len(), 1);
    assert!(ctx.mixer().unwrap().action_ids().next().is_none());
}

#[test]
fn test_failed_load_leaves_graph_untouched() {
    let mut ctx = common::mounted(ViewerConfig::default());
    pollster::block_on(ctx.init_scene("tri.obj")).unwrap();
    let nodes = ctx.graph().unwrap().node_count();
    let materials = ctx.graph().unwrap().material_count();

    let err = pollster::block_on(ctx.load_model("missing.glb")).unwrap_err();
    assert!(matches!(err, ViewerError::AssetLoadError { .. }));
    let err = pollster::block_on(ctx.load_model("scene.fbx")).unwrap_err();
    assert!(matches!(err, ViewerError::LoaderInitError { .. }));

    assert_eq!(ctx.graph().unwrap().node_count(), nodes);
    assert_eq!(ctx.graph().unwrap().material_count(), materials);
}

#[test]
fn test_target_size_none_keeps_native_scale() {
    let config = ViewerConfig {
        loader: LoaderOptions::default().with_target_size(None),
        ..Default::default()
    };
    let mut ctx = common::mounted(config);
    pollster::block_on(ctx.init_scene("wedge.stl")).unwrap();

    let model = ctx.model().unwrap();
    assert_eq!(model.placement.scale, 1.0);
    let bounds = ctx.graph().unwrap().subtree_bounds(model.root);
    assert!((bounds.size().y - 8.0).abs() < 1e-4);
    assert!(bounds.min.y.abs() < 1e-4);
}
