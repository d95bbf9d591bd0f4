//! Integration tests for the engine frame lifecycle across threads.

use std::io::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use gled::{Engine, EngineConfig, EngineError};
use gled_core::memory::{Allocator, Owned, OwnedSlice};
use gled_core::MemoryError;
use gled_rendering::{GpuBuffers, HeadlessDevice, PolygonFace, PolygonMode};
use parking_lot::Mutex;

fn config(toml: &str) -> EngineConfig {
    EngineConfig::from_toml_str(toml).unwrap()
}

fn small_engine() -> Engine<HeadlessDevice> {
    let config = config("[memory]\nsystem_pool_mb = 1\nscene_pool_mb = 1\nframe_pool_mb = 1\n");
    Engine::init(config, HeadlessDevice::new()).unwrap()
}

#[test]
fn test_frame_scratch_reuses_addresses() {
    let mut engine = small_engine();
    let context = Arc::clone(engine.context());

    engine.start_frame();
    let first = {
        let scratch = OwnedSlice::<u64>::zeroed_in(128, context.frame_allocator()).unwrap();
        scratch.as_ptr() as usize
    };
    engine.finish_frame(false).unwrap();

    engine.start_frame();
    let second = {
        let scratch = OwnedSlice::<u64>::zeroed_in(128, context.frame_allocator()).unwrap();
        scratch.as_ptr() as usize
    };
    let stats = engine.finish_frame(false).unwrap();

    assert_eq!(first, second);
    assert_eq!(stats.frame, 1);
    assert!(stats.frame_bytes_used >= 128 * 8);
}

#[test]
fn test_live_frame_object_blocks_finish() {
    let mut engine = small_engine();
    let context = Arc::clone(engine.context());

    engine.start_frame();
    let held = Owned::new_in(7_u32, context.frame_allocator()).unwrap();

    let err = engine.finish_frame(false).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Memory(MemoryError::LiveObjects { .. })
    ));
    assert_eq!(context.frame_count(), 0);
    assert_eq!(*held, 7);

    drop(held);
    engine.finish_frame(false).unwrap();
    assert_eq!(context.frame_count(), 1);
}

#[test]
fn test_update_thread_buffers_reach_device_and_are_freed() {
    let mut engine = small_engine();
    let shared: Arc<Mutex<Option<GpuBuffers>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&shared);
    let mut requested = false;
    engine
        .spawn_update_thread(move |context, _| {
            if !requested {
                *slot.lock() = GpuBuffers::request(3, context.commands()).ok();
                requested = true;
            }
        })
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        engine.start_frame();
        engine.finish_frame(false).unwrap();
        if shared.lock().as_ref().is_some_and(GpuBuffers::is_ready) {
            break;
        }
        assert!(Instant::now() < deadline, "buffers never became ready");
        thread::yield_now();
    }
    assert_eq!(engine.device().live_buffers().len(), 3);

    shared.lock().take();
    let device = engine.shutdown();
    assert!(device.live_buffers().is_empty());
}

#[test]
fn test_wireframe_config_applies_on_first_frame() {
    let mut engine = Engine::init(
        config("[memory]\nframe_pool_mb = 1\n[debug]\nwireframe = true\n"),
        HeadlessDevice::new(),
    )
    .unwrap();

    assert_eq!(engine.device().polygon_mode(PolygonFace::Front), PolygonMode::Fill);
    let drained = engine.start_frame();
    assert_eq!(drained.executed, 1);
    assert_eq!(engine.device().polygon_mode(PolygonFace::Front), PolygonMode::Line);
    assert_eq!(engine.device().polygon_mode(PolygonFace::Back), PolygonMode::Line);
}

#[test]
fn test_scene_unload_waits_for_scene_objects() {
    let engine = small_engine();
    let context = Arc::clone(engine.context());

    context.begin_scene("arena").unwrap();
    let props = OwnedSlice::<[f32; 4]>::zeroed_in(32, context.scene_allocator()).unwrap();

    assert!(context.unload_scene().is_err());
    assert_eq!(context.current_scene().as_deref(), Some("arena"));

    drop(props);
    context.unload_scene().unwrap();
    assert!(context.current_scene().is_none());
    assert_eq!(context.scene_allocator().used(), 0);
}

#[test]
fn test_rate_limit_holds_frame_budget() {
    let mut engine = Engine::init(
        config("[memory]\nframe_pool_mb = 1\n[video]\nmax_fps = 30\n"),
        HeadlessDevice::new(),
    )
    .unwrap();

    let started = Instant::now();
    engine.start_frame();
    engine.finish_frame(true).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(33));

    // Without rate limiting the same frame returns immediately.
    let started = Instant::now();
    engine.start_frame();
    engine.finish_frame(false).unwrap();
    assert!(started.elapsed() < Duration::from_millis(33));
}

#[test]
fn test_config_file_loading() {
    let path = std::env::temp_dir().join(format!("gled-engine-{}.toml", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[video]\nmax_fps = 60\nsync = true").unwrap();
    }
    let loaded = EngineConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.video.max_fps, 60);
    assert!(loaded.video.sync);
    assert_eq!(loaded.memory.frame_pool_mb, 50);

    let missing = EngineConfig::from_file(path.with_extension("missing"));
    assert!(matches!(missing, Err(EngineError::ConfigIo { .. })));

    assert!(matches!(
        EngineConfig::from_toml_str("[video]\nmax_fps = 12\n"),
        Err(EngineError::InvalidConfig(_))
    ));
}
