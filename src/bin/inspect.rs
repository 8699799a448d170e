//! Loads a model the way the viewer does and prints what it found.
//!
//! ```text
//! model-inspect <model> [--config viewer.json] [--screenshot out.png]
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use model_viewer::config::ViewerConfig;
use model_viewer::loader::source::FileSource;
use model_viewer::loader::{load_model, LoaderRegistry};
use model_viewer::surface::HeadlessContainer;
use model_viewer::SceneContext;

#[derive(Parser)]
#[command(name = "model-inspect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load a model the way the viewer does and summarize it", long_about = None)]
struct Args {
    /// Model URL or path (glb, gltf, obj, stl)
    model: String,

    /// Viewer configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render the loaded scene headlessly and save a PNG here
    #[arg(short, long)]
    screenshot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            ViewerConfig::from_json_str(&json)?
        }
        None => ViewerConfig::default(),
    };

    let registry = LoaderRegistry::with_defaults();
    let source = FileSource::new();
    let mut last = -1.0;
    let loaded = pollster::block_on(load_model(
        &args.model,
        &config.loader,
        &registry,
        &source,
        &mut |ratio| {
            if ratio - last >= 0.25 || ratio >= 1.0 {
                info!("Loading {:.0}%", ratio * 100.0);
                last = ratio;
            }
        },
    ))?;

    let size = loaded.bounds.size();
    println!("{} ({:?})", loaded.url, loaded.file_type);
    println!("  meshes:     {}", loaded.scene.root.mesh_count());
    println!("  materials:  {}", loaded.scene.materials.len());
    println!("  textures:   {}", loaded.scene.textures.len());
    println!("  animations: {}", loaded.scene.animations.len());
    for clip in &loaded.scene.animations {
        println!("    {} ({:.2}s, {} tracks)", clip.name, clip.duration, clip.tracks.len());
    }
    println!("  scale:      {:.4}", loaded.placement.scale);
    println!("  size:       {:.3} x {:.3} x {:.3}", size.x, size.y, size.z);
    println!(
        "  bounds:     [{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}]",
        loaded.bounds.min.x,
        loaded.bounds.min.y,
        loaded.bounds.min.z,
        loaded.bounds.max.x,
        loaded.bounds.max.y,
        loaded.bounds.max.z
    );

    if let Some(out) = args.screenshot {
        let mut ctx = SceneContext::new(config);
        ctx.mount(Box::new(HeadlessContainer::new(1280, 720)));
        let token = pollster::block_on(ctx.init_scene(&args.model))?;
        ctx.frame(token, 0.0);
        let png = ctx.take_screenshot()?;
        fs::write(&out, &png).with_context(|| format!("writing {}", out.display()))?;
        println!("  screenshot: {} ({} bytes)", out.display(), png.len());
        ctx.dispose();
    }
    Ok(())
}
