//! Drives one `DisplayBufferCompositor` per output on its own tokio task.
//!
//! Tasks sleep until the scene changes (or someone asks for a frame), then
//! composite. A pass that reports a backlog immediately wakes its own task
//! again.

use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::display_buffer_compositor::{DisplayBuffer, DisplayBufferCompositor, Renderer};
use super::renderable::Scene;
use super::report::CompositorReport;
use crate::config::CompositorConfig;
use crate::geometry::Point;
use crate::scene::{SceneObserver, SurfaceId};

/// One output to drive
pub struct CompositorOutput {
    pub display: Arc<dyn DisplayBuffer>,
    pub renderer: Arc<dyn Renderer>,
    pub bypass: bool,
}

/// Wakes every output on any scene change
struct WakeOnChange {
    wakers: Vec<Arc<Notify>>,
}

impl WakeOnChange {
    fn wake_all(&self) {
        for waker in &self.wakers {
            waker.notify_one();
        }
    }
}

impl SceneObserver for WakeOnChange {
    fn surface_added(&self, _surface: SurfaceId) {
        self.wake_all();
    }

    fn surface_removed(&self, _surface: SurfaceId) {
        self.wake_all();
    }

    fn surfaces_reordered(&self) {
        self.wake_all();
    }

    fn scene_changed(&self) {
        self.wake_all();
    }
}

struct Running {
    observer: Arc<WakeOnChange>,
    stop: watch::Sender<bool>,
    cursor: watch::Sender<Point>,
    tasks: Vec<JoinHandle<u64>>,
}

pub struct MultiThreadedCompositor {
    scene: Arc<dyn Scene>,
    report: Arc<dyn CompositorReport>,
    config: CompositorConfig,
    outputs: Vec<CompositorOutput>,
    running: Option<Running>,
}

impl MultiThreadedCompositor {
    pub fn new(
        scene: Arc<dyn Scene>,
        report: Arc<dyn CompositorReport>,
        config: &CompositorConfig,
        outputs: Vec<CompositorOutput>,
    ) -> Self {
        Self {
            scene,
            report,
            config: config.clone(),
            outputs,
            running: None,
        }
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the per-output tasks on the current runtime. Every output
    /// composites once right away.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (cursor_tx, cursor_rx) = watch::channel(Point::default());
        let mut wakers = Vec::with_capacity(self.outputs.len());
        let mut tasks = Vec::with_capacity(self.outputs.len());

        for output in &self.outputs {
            let mut compositor = DisplayBufferCompositor::new(
                output.display.clone(),
                self.scene.clone(),
                output.renderer.clone(),
                self.report.clone(),
            )
            .with_bypass(self.config.bypass && output.bypass);
            if self.config.zoom != 1.0 {
                compositor.zoom(self.config.zoom);
            }

            let wake = Arc::new(Notify::new());
            wake.notify_one();
            wakers.push(wake.clone());

            tasks.push(tokio::spawn(run_output(
                compositor,
                wake,
                stop_rx.clone(),
                cursor_rx.clone(),
            )));
        }

        let observer = Arc::new(WakeOnChange { wakers });
        let as_scene_observer: Arc<dyn SceneObserver> = observer.clone();
        self.scene.add_observer(Arc::downgrade(&as_scene_observer));

        self.report.started();
        info!("🎬 Compositing {} output(s)", tasks.len());

        self.running = Some(Running {
            observer,
            stop: stop_tx,
            cursor: cursor_tx,
            tasks,
        });
    }

    /// Ask every output for a new frame
    pub fn schedule_compositing(&self) {
        if let Some(running) = &self.running {
            running.observer.wake_all();
        }
    }

    /// Forward a cursor position to every output (drives the zoom viewport)
    pub fn move_cursor(&self, position: Point) {
        if let Some(running) = &self.running {
            running.cursor.send_replace(position);
        }
    }

    /// Stop all output tasks and wait for them. Returns the number of frames
    /// produced since `start`.
    pub async fn stop(&mut self) -> u64 {
        let Some(running) = self.running.take() else {
            return 0;
        };

        self.scene.remove_observer(&*running.observer);
        running.stop.send_replace(true);

        let mut frames = 0;
        for task in running.tasks {
            match task.await {
                Ok(count) => frames += count,
                Err(e) => error!("❌ Output task failed: {}", e),
            }
        }

        self.report.stopped();
        info!("🛑 Compositing stopped after {} frame(s)", frames);
        frames
    }
}

async fn run_output(
    mut compositor: DisplayBufferCompositor,
    wake: Arc<Notify>,
    mut stop: watch::Receiver<bool>,
    mut cursor: watch::Receiver<Point>,
) -> u64 {
    let mut frames = 0;
    debug!("🧵 Output task for {:?} started", compositor.id());

    loop {
        if *stop.borrow() {
            break;
        }

        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = cursor.changed() => {
                if changed.is_ok() {
                    let position = *cursor.borrow_and_update();
                    compositor.on_cursor_movement(position);
                    wake.notify_one();
                }
            }
            _ = wake.notified() => {
                frames += 1;
                if compositor.composite() {
                    wake.notify_one();
                }
                tokio::task::yield_now().await;
            }
        }
    }

    debug!("🧵 Output task for {:?} finished", compositor.id());
    frames
}

impl Drop for MultiThreadedCompositor {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            self.scene.remove_observer(&*running.observer);
            running.stop.send_replace(true);
        }
    }
}
