//! Headless display server
//!
//! Owns the scene, the input stack (device hub, dispatcher, seat) and the
//! multi-output compositor, and runs them until a signal or the configured
//! run time ends. Outputs are headless display buffers; clients are
//! simulated by the demo.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::signal;

use crate::compositor::{
    CompositorOutput, LoggingCompositorReport, MultiThreadedCompositor, SoftwareBuffer,
};
use crate::config::{ExecutorKind, KeystoneConfig};
use crate::geometry::{Rectangle, Size};
use crate::input::{
    ClientId, DefaultInputDispatcher, DeviceId, DeviceInfo, Event, InputDeviceHub,
    InputDispatcher, InputEvent, InputEventKind, InputScene, InputSurface, KeyAction,
    KeyboardListener, Keymap, PointerAction, PointerButtons, Seat,
};
use crate::observer::{Executor, InlineExecutor, WorkQueueExecutor};
use crate::platform::{CountingRenderer, HeadlessDisplayBuffer};
use crate::scene::{BasicSurface, EventSink, SurfaceId, SurfaceParams, SurfaceStack};

const DEMO_KEYBOARD: DeviceId = DeviceId(1);
const DEMO_POINTER: DeviceId = DeviceId(2);

/// Build the executor observers are notified on
fn observer_executor(kind: ExecutorKind, name: &str) -> Result<Arc<dyn Executor>> {
    Ok(match kind {
        ExecutorKind::Inline => Arc::new(InlineExecutor),
        ExecutorKind::Queue => {
            let handle = Handle::try_current()
                .context("Work queue executors need a running tokio runtime")?;
            Arc::new(WorkQueueExecutor::new(name, &handle))
        }
    })
}

/// Logs what a simulated client receives
struct LoggingEventSink {
    surface: String,
}

impl EventSink for LoggingEventSink {
    fn handle_event(&self, event: &InputEvent) {
        debug!("📨 '{}' received {:?}", self.surface, event.kind);
    }
}

/// Keyboard listener for a simulated client
struct LoggingKeyboardListener {
    client: ClientId,
}

impl KeyboardListener for LoggingKeyboardListener {
    fn keymap_changed(&self, keymap: &Keymap) {
        info!("⌨️ Client {:?} keymap is now {}", self.client, keymap.layout);
    }

    fn focus_gained(&self, surface: SurfaceId) {
        debug!("🎯 Client {:?} gained focus on {:?}", self.client, surface);
    }

    fn focus_lost(&self, surface: SurfaceId) {
        debug!("🎯 Client {:?} lost focus on {:?}", self.client, surface);
    }
}

/// The assembled server
pub struct DisplayServer {
    config: KeystoneConfig,
    scene: Arc<SurfaceStack>,
    dispatcher: Arc<DefaultInputDispatcher>,
    devices: Arc<InputDeviceHub>,
    seat: Seat,
    compositor: MultiThreadedCompositor,
    displays: Vec<Arc<HeadlessDisplayBuffer>>,
    listeners: Vec<Arc<dyn KeyboardListener>>,
    running: bool,
}

impl DisplayServer {
    /// Assemble every subsystem. Must be called inside a tokio runtime when
    /// the configuration asks for work queue executors.
    pub fn new(config: KeystoneConfig) -> Result<Self> {
        config.validate().context("Refusing to start with an invalid configuration")?;
        info!("🏗️ Initializing Keystone display server...");

        debug!("🗂️ Initializing scene...");
        let scene = Arc::new(SurfaceStack::new(observer_executor(
            config.observers.executor,
            "scene-observers",
        )?));

        debug!("⌨️ Initializing input stack...");
        let input_scene: Arc<dyn InputScene> = scene.clone();
        let dispatcher = Arc::new(DefaultInputDispatcher::new(input_scene, &config.input));
        let devices = Arc::new(InputDeviceHub::new(observer_executor(
            config.observers.executor,
            "device-observers",
        )?));
        let as_dispatcher: Arc<dyn InputDispatcher> = dispatcher.clone();
        let seat = Seat::new(devices.clone(), as_dispatcher);

        debug!("🖥️ Initializing {} output(s)...", config.outputs.len());
        if config.outputs.len() > config.compositor.max_outputs_hint {
            warn!(
                "⚠️ {} outputs configured, more than the expected {}",
                config.outputs.len(),
                config.compositor.max_outputs_hint
            );
        }
        let mut displays = Vec::with_capacity(config.outputs.len());
        let mut outputs = Vec::with_capacity(config.outputs.len());
        for output in &config.outputs {
            let display = Arc::new(HeadlessDisplayBuffer::new(output.area(), output.bypass));
            outputs.push(CompositorOutput {
                display: display.clone(),
                renderer: Arc::new(CountingRenderer::new()),
                bypass: output.bypass,
            });
            displays.push(display);
            debug!("🖥️ Output '{}' at {:?}", output.name, output.area());
        }

        let compositor = MultiThreadedCompositor::new(
            scene.clone(),
            Arc::new(LoggingCompositorReport::new()),
            &config.compositor,
            outputs,
        );

        info!("✅ All subsystems initialized successfully");

        Ok(Self {
            config,
            scene,
            dispatcher,
            devices,
            seat,
            compositor,
            displays,
            listeners: Vec::new(),
            running: false,
        })
    }

    pub fn config(&self) -> &KeystoneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Arc<SurfaceStack> {
        &self.scene
    }

    pub fn dispatcher(&self) -> &Arc<DefaultInputDispatcher> {
        &self.dispatcher
    }

    pub fn devices(&self) -> &Arc<InputDeviceHub> {
        &self.devices
    }

    pub fn seat(&self) -> &Seat {
        &self.seat
    }

    pub fn displays(&self) -> &[Arc<HeadlessDisplayBuffer>] {
        &self.displays
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start input dispatch and compositing on the current runtime
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.dispatcher.start();
        self.compositor.start();
        self.running = true;
        info!("🎬 Keystone display server started");
    }

    /// Create a surface and place it on top of the scene
    pub fn create_surface(&self, name: &str, area: Rectangle) -> Arc<BasicSurface> {
        let surface = Arc::new(BasicSurface::new(SurfaceParams {
            name: name.to_string(),
            top_left: area.top_left(),
            size: area.size(),
            framedropping: self.config.compositor.framedropping,
            expected_consumers: self.config.compositor.max_outputs_hint,
            ..SurfaceParams::default()
        }));
        surface.set_event_sink(Arc::new(LoggingEventSink {
            surface: name.to_string(),
        }));
        self.scene.add_surface(surface.clone());
        surface
    }

    /// Route one event and move the cursor for pointer motion. Contract
    /// violations are logged and returned.
    pub fn dispatch(&self, event: &Event) -> crate::error::CoreResult<bool> {
        if let Some(InputEventKind::Pointer(pointer)) = event.as_input().map(|input| &input.kind) {
            self.compositor.move_cursor(pointer.position());
        }
        self.dispatcher
            .dispatch(event)
            .inspect_err(|e| error!("❌ Failed to dispatch event: {}", e))
    }

    /// Run until SIGTERM, SIGINT or the configured run time elapses
    pub async fn run(mut self) -> Result<()> {
        self.start();
        info!("🎬 Starting Keystone event loop");

        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

        let run_for = self.config.general.run_for_secs.map(Duration::from_secs);
        let deadline = async move {
            match run_for {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        tokio::select! {
            _ = sigterm.recv() => {
                info!("📨 Received SIGTERM, shutting down gracefully");
            }
            _ = sigint.recv() => {
                info!("📨 Received SIGINT (Ctrl+C), shutting down gracefully");
            }
            _ = &mut deadline => {
                info!("⏱️ Run time elapsed, shutting down");
            }
        }

        self.shutdown().await?;
        info!("🛑 Keystone event loop finished");
        Ok(())
    }

    /// Simulate two clients: map surfaces, submit frames, focus and click
    pub async fn run_demo(&mut self) -> Result<()> {
        self.start();
        info!("🎭 Running demo clients...");

        self.devices.add_device(DeviceInfo::keyboard(
            DEMO_KEYBOARD,
            "demo keyboard",
            Keymap::with_layout("us"),
        ));
        self.devices
            .add_device(DeviceInfo::pointer(DEMO_POINTER, "demo pointer"));

        let first_area = self
            .config
            .outputs
            .first()
            .map(|output| output.area())
            .context("No outputs configured")?;

        let terminal = self.create_surface(
            "terminal",
            Rectangle::new(first_area.x + 100, first_area.y + 100, 640, 480),
        );
        let fullscreen = self.create_surface("video", first_area);

        let mut clients: Vec<(ClientId, Arc<BasicSurface>)> = Vec::new();
        for (index, surface) in [terminal.clone(), fullscreen.clone()].into_iter().enumerate() {
            let client = ClientId(index as u64 + 1);
            let listener: Arc<dyn KeyboardListener> =
                Arc::new(LoggingKeyboardListener { client });
            self.seat
                .add_keyboard_listener(client, Arc::downgrade(&listener));
            self.listeners.push(listener);
            clients.push((client, surface));
        }

        let started = Instant::now();
        for frame in 0..3u32 {
            terminal.submit_buffer(Arc::new(SoftwareBuffer::new(Size::new(640, 480))));
            fullscreen.submit_buffer(Arc::new(SoftwareBuffer::scanout(first_area.size())));
            debug!("🖼️ Demo frame {} submitted", frame);
            tokio::time::sleep(Duration::from_millis(16)).await;
        }

        // Fullscreen content on top of the first output gets bypassed;
        // raising the terminal forces real compositing again.
        self.scene.raise(terminal.id());
        let (client, surface) = &clients[0];
        let focus: Arc<dyn InputSurface> = surface.clone();
        self.seat.set_focus(Some((*client, &focus)));

        let timestamp = started.elapsed();
        let mut delivered = 0;
        let events = [
            Event::key(DEMO_KEYBOARD, timestamp, KeyAction::Down, 30),
            Event::key(DEMO_KEYBOARD, timestamp, KeyAction::Up, 30),
            Event::pointer(
                DEMO_POINTER,
                timestamp,
                PointerAction::Motion,
                PointerButtons::empty(),
                (first_area.x + 200) as f32,
                (first_area.y + 200) as f32,
            ),
            Event::pointer(
                DEMO_POINTER,
                timestamp,
                PointerAction::ButtonDown,
                PointerButtons::PRIMARY,
                (first_area.x + 200) as f32,
                (first_area.y + 200) as f32,
            ),
            Event::pointer(
                DEMO_POINTER,
                timestamp,
                PointerAction::ButtonUp,
                PointerButtons::empty(),
                (first_area.x + 210) as f32,
                (first_area.y + 210) as f32,
            ),
        ];
        for event in &events {
            if self.dispatch(event)? {
                delivered += 1;
            }
        }
        info!("🎯 Demo delivered {}/{} events", delivered, events.len());

        self.scene.remove_surface(fullscreen.id());
        tokio::time::sleep(Duration::from_millis(50)).await;

        for (index, display) in self.displays.iter().enumerate() {
            info!("🖥️ Output {} posted {} frame(s)", index, display.post_count());
        }
        info!("🎆 Demo completed in {:?}", started.elapsed());
        Ok(())
    }

    /// Stop compositing and input. Returns the number of frames composited.
    pub async fn shutdown(&mut self) -> Result<u64> {
        if !self.running {
            return Ok(0);
        }
        info!("🔽 Shutting down Keystone display server...");
        self.running = false;

        debug!("🧹 Stopping compositor...");
        let frames = self.compositor.stop().await;

        debug!("🧹 Stopping input dispatch...");
        self.seat.set_focus(None);
        self.dispatcher.stop();

        info!("✅ Keystone shutdown complete ({} frame(s))", frames);
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;

    fn two_output_config() -> KeystoneConfig {
        let mut config = KeystoneConfig::default();
        config.outputs = vec![
            OutputConfig::new("LEFT", Rectangle::new(0, 0, 800, 600)),
            OutputConfig::new("RIGHT", Rectangle::new(800, 0, 800, 600)),
        ];
        config
    }

    #[tokio::test]
    async fn test_server_rejects_invalid_config() {
        let mut config = KeystoneConfig::default();
        config.outputs.clear();
        assert!(DisplayServer::new(config).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_starts_and_shuts_down() -> Result<()> {
        let mut server = DisplayServer::new(two_output_config())?;
        assert_eq!(server.displays().len(), 2);
        assert!(!server.is_running());

        server.start();
        assert!(server.is_running());
        tokio::time::sleep(Duration::from_millis(20)).await;

        server.shutdown().await?;
        assert!(!server.is_running());
        assert!(server.displays().iter().all(|d| d.post_count() >= 1));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_demo_runs_with_queue_executors() -> Result<()> {
        let mut config = two_output_config();
        config.observers.executor = ExecutorKind::Queue;
        let mut server = DisplayServer::new(config)?;

        server.run_demo().await?;
        assert_eq!(server.scene().len(), 1);
        assert_eq!(server.devices().devices().len(), 2);
        assert_eq!(server.seat().focused_client(), Some(ClientId(1)));

        server.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_dispatch_without_focus_is_not_delivered() -> Result<()> {
        let server = DisplayServer::new(KeystoneConfig::default())?;
        let event = Event::key(DEMO_KEYBOARD, Duration::ZERO, KeyAction::Down, 30);
        assert!(!server.dispatch(&event)?);
        Ok(())
    }
}
