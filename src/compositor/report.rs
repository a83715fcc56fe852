//! Per-frame compositor reporting

use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::arbiter::CompositorId;
use crate::geometry::Rectangle;

/// Number of frames between periodic statistics lines
const REPORT_INTERVAL_FRAMES: u64 = 300;

pub trait CompositorReport: Send + Sync {
    fn added_display(&self, _id: CompositorId, _view_area: Rectangle) {}

    fn began_frame(&self, id: CompositorId);

    fn finished_frame(&self, id: CompositorId, bypassed: bool);

    fn started(&self) {}

    fn stopped(&self) {}
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCompositorReport;

impl CompositorReport for NullCompositorReport {
    fn began_frame(&self, _id: CompositorId) {}

    fn finished_frame(&self, _id: CompositorId, _bypassed: bool) {}
}

/// Statistics about frame timing of one output
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    /// Total frames composited or bypassed
    pub total_frames: u64,
    pub bypassed_frames: u64,
    pub avg_frame_time: Duration,
    pub min_frame_time: Duration,
    pub max_frame_time: Duration,
    pub last_frame_time: Duration,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            total_frames: 0,
            bypassed_frames: 0,
            avg_frame_time: Duration::ZERO,
            min_frame_time: Duration::MAX,
            max_frame_time: Duration::ZERO,
            last_frame_time: Duration::ZERO,
        }
    }
}

impl FrameStats {
    fn record(&mut self, frame_time: Duration, bypassed: bool) {
        let previous_total = self.avg_frame_time * self.total_frames as u32;
        self.total_frames += 1;
        if bypassed {
            self.bypassed_frames += 1;
        }
        self.avg_frame_time = (previous_total + frame_time) / self.total_frames as u32;
        self.min_frame_time = self.min_frame_time.min(frame_time);
        self.max_frame_time = self.max_frame_time.max(frame_time);
        self.last_frame_time = frame_time;
    }

    pub fn bypass_rate(&self) -> f32 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.bypassed_frames as f32 / self.total_frames as f32
    }
}

#[derive(Default)]
struct OutputRecord {
    frame_start: Option<Instant>,
    stats: FrameStats,
}

/// Keeps frame statistics per output and logs them periodically
#[derive(Default)]
pub struct LoggingCompositorReport {
    outputs: Mutex<HashMap<CompositorId, OutputRecord>>,
}

impl LoggingCompositorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, id: CompositorId) -> Option<FrameStats> {
        self.outputs.lock().get(&id).map(|r| r.stats.clone())
    }
}

impl CompositorReport for LoggingCompositorReport {
    fn added_display(&self, id: CompositorId, view_area: Rectangle) {
        info!(
            "🖥️ Compositing {:?} at {}x{}+{}+{}",
            id, view_area.width, view_area.height, view_area.x, view_area.y
        );
        self.outputs.lock().entry(id).or_default();
    }

    fn began_frame(&self, id: CompositorId) {
        self.outputs.lock().entry(id).or_default().frame_start = Some(Instant::now());
    }

    fn finished_frame(&self, id: CompositorId, bypassed: bool) {
        let mut outputs = self.outputs.lock();
        let record = outputs.entry(id).or_default();
        let frame_time = record
            .frame_start
            .take()
            .map_or(Duration::ZERO, |start| start.elapsed());
        record.stats.record(frame_time, bypassed);

        let stats = &record.stats;
        if stats.total_frames % REPORT_INTERVAL_FRAMES == 0 {
            debug!(
                "📊 {:?}: {} frames, avg {:.2}ms, max {:.2}ms, {:.0}% bypassed",
                id,
                stats.total_frames,
                stats.avg_frame_time.as_secs_f64() * 1000.0,
                stats.max_frame_time.as_secs_f64() * 1000.0,
                stats.bypass_rate() * 100.0
            );
        }
    }

    fn started(&self) {
        info!("🎬 Compositor started");
    }

    fn stopped(&self) {
        info!("🛑 Compositor stopped");
    }
}
