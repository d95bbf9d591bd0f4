//! # Headless Demo
//!
//! Runs the engine against the headless device for a fixed number of frames:
//! an update thread and a loader thread request GPU objects, the render loop
//! drains them and uses the frame tier for scratch.
//!
//! ```text
//! cargo run --bin headless_demo -- [config.toml]
//! RUST_LOG=gled=debug cargo run --bin headless_demo
//! ```

use std::sync::Arc;
use std::thread;

use gled::{Engine, EngineConfig, EngineError, EngineResult};
use gled_core::memory::{Allocator, OwnedSlice};
use gled_rendering::{GpuBuffers, GpuTexture, HeadlessDevice};
use tracing_subscriber::EnvFilter;

const FRAMES: u64 = 120;
const MESHES: usize = 4;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        tracing::error!(error = %err, "demo failed");
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    let mut engine = Engine::init(config, HeadlessDevice::new())?;
    let context = Arc::clone(engine.context());
    context.begin_scene("demo")?;
    let terrain = OwnedSlice::<[f32; 3]>::zeroed_in(4096, context.scene_allocator())?;

    // The loader streams mesh buffers in and hands the owners to the render loop.
    let (mesh_tx, mesh_rx) = crossbeam_channel::unbounded();
    let loader_commands = context.commands().clone();
    let loader = thread::Builder::new()
        .name("demo-loader".into())
        .spawn(move || {
            for _ in 0..MESHES {
                match GpuBuffers::request(2, &loader_commands) {
                    Ok(buffers) => {
                        if mesh_tx.send(buffers).is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "mesh request failed"),
                }
            }
        })
        .map_err(|source| EngineError::ThreadSpawn {
            name: "demo-loader",
            source,
        })?;

    let mut texture = None;
    engine.spawn_update_thread(move |context, _elapsed| {
        if texture.is_none() {
            texture = GpuTexture::request(context.commands()).ok();
        }
        thread::yield_now();
    })?;

    let mut meshes = Vec::new();
    for frame in 0..FRAMES {
        engine.start_frame();
        meshes.extend(mesh_rx.try_iter());

        {
            let transforms = OwnedSlice::<[f32; 16]>::zeroed_in(64, context.frame_allocator())?;
            tracing::trace!(frame, bytes = transforms.as_bytes().len(), "frame scratch");
        }

        if frame == FRAMES / 2 {
            context.set_wireframe(!engine.config().debug.wireframe)?;
        }
        engine.finish_frame(true)?;
    }

    if loader.join().is_err() {
        tracing::warn!("loader thread panicked");
    }
    meshes.extend(mesh_rx.try_iter());
    let ready = meshes.iter().filter(|mesh| mesh.is_ready()).count();
    tracing::info!(
        meshes = meshes.len(),
        ready,
        terrain_vertices = terrain.len(),
        scene_bytes = context.scene_allocator().used(),
        "demo frames finished"
    );
    drop(meshes);
    drop(terrain);

    let device = engine.shutdown();
    tracing::info!(
        live_buffers = device.live_buffers().len(),
        live_textures = device.live_textures().len(),
        calls = device.calls().len(),
        "headless device state"
    );
    Ok(())
}
