//! Preview scheduling tests.
//!
//! The debounce timer is driven with synthetic instants; renders run on a
//! real worker thread with the block backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use decal::{PreviewScheduler, PreviewState};
use decal_core::Worker;
use decal_render::font::{FontCatalog, FontLibrary, FontObjectCache};
use decal_render::testing::BlockBackend;
use decal_render::{LayoutEngine, RenderRequest};

const DEBOUNCE: Duration = Duration::from_millis(150);
const WAIT: Duration = Duration::from_secs(10);
const PANEL: (u32, u32) = (800, 800);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn scheduler(backend: Arc<BlockBackend>) -> (PreviewScheduler, Arc<Worker>) {
    let library = Arc::new(FontLibrary::from_catalog(FontCatalog::new()));
    let fonts = Arc::new(FontObjectCache::new(library, backend));
    let engine = Arc::new(LayoutEngine::new(fonts));
    let worker = Arc::new(Worker::new());
    (PreviewScheduler::new(engine, Arc::clone(&worker), DEBOUNCE), worker)
}

fn request(text: &str) -> RenderRequest {
    RenderRequest::new(text).with_canvas_size(256).with_font("Block", 40)
}

#[test]
fn rapid_changes_render_once() {
    let backend = Arc::new(BlockBackend::new());
    let (mut preview, worker) = scheduler(Arc::clone(&backend));
    let t0 = Instant::now();

    for (i, text) in ["H", "He", "Hel", "Hell", "Hello"].into_iter().enumerate() {
        preview.request(request(text), PANEL, t0 + ms(20 * i as u64));
        assert!(!preview.poll(t0 + ms(20 * i as u64 + 10)));
    }
    assert_eq!(preview.state(), PreviewState::Pending);
    assert_eq!(preview.time_until_next(t0 + ms(80)), Some(DEBOUNCE));

    // Quiet for less than the delay after the last change.
    assert!(!preview.poll(t0 + ms(80 + 149)));
    assert_eq!(preview.stats().submitted, 0);

    assert!(preview.poll(t0 + ms(80 + 150)) || preview.wait_for_frame(WAIT));

    assert_eq!(backend.draw_count(), 1);
    assert_eq!(preview.stats().submitted, 1);
    assert_eq!(preview.current().unwrap().request.text, "Hello");
    assert_eq!(preview.state(), PreviewState::Idle);
    worker.stop_and_join();
}

#[test]
fn separated_changes_render_twice() {
    let backend = Arc::new(BlockBackend::new());
    let (mut preview, worker) = scheduler(Arc::clone(&backend));
    let t0 = Instant::now();

    preview.request(request("A"), PANEL, t0);
    assert!(preview.poll(t0 + ms(200)) || preview.wait_for_frame(WAIT));
    assert_eq!(preview.current().unwrap().request.text, "A");

    let t1 = t0 + ms(500);
    preview.request(request("B"), PANEL, t1);
    assert!(preview.poll(t1 + ms(200)) || preview.wait_for_frame(WAIT));

    assert_eq!(backend.draw_count(), 2);
    assert_eq!(preview.stats().applied, 2);
    assert_eq!(preview.current().unwrap().request.text, "B");
    assert!(preview.current().unwrap().sequence > 1);
    worker.stop_and_join();
}

#[test]
fn older_results_never_replace_newer() {
    let backend = Arc::new(BlockBackend::with_delay(ms(100)));
    let (mut preview, worker) = scheduler(backend);

    preview.request(request("old"), PANEL, Instant::now());
    preview.flush();
    preview.request(request("new"), PANEL, Instant::now());
    preview.flush();
    assert_eq!(preview.state(), PreviewState::Rendering);

    assert!(preview.wait_for_frame(WAIT));

    let stats = preview.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.stale, 1);
    assert_eq!(preview.current().unwrap().request.text, "new");

    // Nothing left in flight.
    assert!(!preview.wait_for_frame(ms(50)));
    assert_eq!(preview.current().unwrap().request.text, "new");
    worker.stop_and_join();
}

#[test]
fn frames_are_scaled_to_the_panel() {
    let (mut preview, worker) = scheduler(Arc::new(BlockBackend::new()));

    preview.request(request("fit").with_canvas_size(1024), (150, 150), Instant::now());
    preview.flush();
    assert!(preview.wait_for_frame(WAIT));
    let frame = preview.current().unwrap();
    assert_eq!(frame.display_size, 500);
    assert_eq!(frame.image.dimensions(), (500, 500));

    preview.request(request("fit"), (800, 600), Instant::now());
    preview.flush();
    assert!(preview.wait_for_frame(WAIT));
    let frame = preview.current().unwrap();
    assert_eq!(frame.display_size, 256);
    assert_eq!(frame.image.dimensions(), (256, 256));
    // Opaque checkerboard behind the text.
    assert!(frame.image.pixels().all(|p| p.0[3] == 255));
    worker.stop_and_join();
}

#[test]
fn failed_render_keeps_previous_frame() {
    let (mut preview, worker) = scheduler(Arc::new(BlockBackend::new()));

    preview.request(request("ok"), PANEL, Instant::now());
    preview.flush();
    assert!(preview.wait_for_frame(WAIT));

    preview.request(request("bad").with_canvas_size(0), PANEL, Instant::now());
    preview.flush();
    assert!(!preview.wait_for_frame(WAIT));

    assert_eq!(preview.stats().failed, 1);
    assert_eq!(preview.current().unwrap().request.text, "ok");
    assert_eq!(preview.state(), PreviewState::Idle);
    worker.stop_and_join();
}
