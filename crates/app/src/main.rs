//! modelkit: import a model through the headless device and report the GPU
//! resources it would own.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use asset::SlotMapping;
use clap::Parser;
use renderer::headless::HeadlessDevice;
use renderer::{ImportOptions, Model, ProgramId};

#[derive(Debug, Parser)]
#[command(name = "modelkit", version, about = "Import a model and report its GPU resources")]
struct Args {
    /// Model file (.obj, .gltf or .glb)
    path: PathBuf,

    /// Store diffuse textures as sRGB
    #[arg(long)]
    gamma: bool,

    /// TOML file overriding the slot mapping of the model's format
    #[arg(long, value_name = "TOML")]
    slot_map: Option<PathBuf>,

    /// Draw the model once and print the recorded device calls
    #[arg(long)]
    trace: bool,

    /// Leave textures that failed to load unbound
    #[arg(long)]
    no_placeholder: bool,

    /// Keep texture V coordinates as stored in the file
    #[arg(long)]
    keep_uvs: bool,
}

impl Args {
    fn import_options(&self) -> Result<ImportOptions> {
        let mut options = ImportOptions::default().with_gamma(self.gamma);
        if let Some(path) = &self.slot_map {
            options = options.with_slot_mapping(SlotMapping::load(path)?);
        }
        options.placeholder_on_failure = !self.no_placeholder;
        options.post_process.flip_uvs = !self.keep_uvs;
        Ok(options)
    }
}

fn print_report(model: &Model, device: &HeadlessDevice) {
    let stats = model.stats();
    println!("directory: {}", model.directory().display());
    println!(
        "meshes: {} built, {} skipped",
        stats.meshes, stats.skipped_meshes
    );
    for (i, mesh) in model.meshes().iter().enumerate() {
        println!(
            "  [{i}] {:<24} {:>7} vertices {:>7} triangles {:>2} textures{}",
            mesh.name(),
            mesh.vertices().len(),
            mesh.indices().len() / 3,
            mesh.textures().len(),
            if mesh.has_tex_coords() { "" } else { " (no uvs)" }
        );
    }
    println!(
        "textures: {} uploaded, {} reused, {} failed",
        stats.textures_uploaded, stats.textures_reused, stats.textures_failed
    );
    for texture in model.textures() {
        let state = if texture.degraded { "placeholder" } else { "ok" };
        let slot = format!("{:?}", texture.slot);
        println!(
            "  {:>4} {:<10} {:<11} {}",
            texture.id.0, slot, state, texture.reference
        );
    }
    let counters = device.counters();
    println!(
        "device: {} textures, {} meshes live",
        counters.live_textures(),
        counters.live_meshes()
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = args.import_options()?;
    log::info!(
        "Importing {} (gamma={}, placeholder={}, flip_uvs={})",
        args.path.display(),
        options.gamma_correction,
        options.placeholder_on_failure,
        options.post_process.flip_uvs
    );

    let device = Rc::new(HeadlessDevice::new());
    let model = Model::load(device.clone(), &args.path, &options)
        .with_context(|| format!("Failed to import {}", args.path.display()))?;
    print_report(&model, &device);

    if args.trace {
        device.take_commands();
        model.draw(ProgramId(1));
        println!("draw trace:");
        for command in device.take_commands() {
            println!("  {command:?}");
        }
    }
    Ok(())
}
