//! # Frame Statistics
//!
//! Frame-time tracking behind the viewer's stats overlay. Frames are fed in
//! by the render loop as deltas, so the figures follow the host's clock and
//! not wall time. Every `refresh_interval` of recorded time the sample window
//! is folded into FPS / average / min / max figures.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use model_viewer::performance::PerformanceMonitor;
//!
//! let mut monitor = PerformanceMonitor::new();
//! for _ in 0..10 {
//!     monitor.record_frame(Duration::from_millis(20));
//! }
//! assert!((monitor.get_metrics().fps - 50.0).abs() < 0.5);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

/// Figures over the current sample window
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub fps: f32,
    /// Mean of the window, in milliseconds
    pub frame_time_ms: f32,
    pub min_frame_time_ms: f32,
    pub max_frame_time_ms: f32,
    /// Draw calls issued by the last render
    pub draw_calls: u32,
    /// Vertices submitted by the last render
    pub vertex_count: u32,
    /// Frames recorded since creation or the last reset
    pub total_frames: u64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: 0.0,
            frame_time_ms: 0.0,
            min_frame_time_ms: 0.0,
            max_frame_time_ms: 0.0,
            draw_calls: 0,
            vertex_count: 0,
            total_frames: 0,
        }
    }
}

pub struct PerformanceMonitor {
    window: VecDeque<f32>,
    capacity: usize,
    pending: Duration,
    refresh_interval: Duration,
    metrics: PerformanceMetrics,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::with_samples(120)
    }

    /// Averages over the last `capacity` frames (at least one)
    pub fn with_samples(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            pending: Duration::ZERO,
            refresh_interval: Duration::from_millis(100),
            metrics: PerformanceMetrics::default(),
        }
    }

    /// How much recorded frame time passes between metric refreshes
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Adds one frame's duration as measured by the host loop
    pub fn record_frame(&mut self, frame_time: Duration) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(frame_time.as_secs_f32() * 1000.0);
        self.metrics.total_frames += 1;

        self.pending += frame_time;
        if self.pending >= self.refresh_interval || self.metrics.total_frames == 1 {
            self.refresh();
        }
    }

    /// Recomputes the figures from the window immediately
    pub fn refresh(&mut self) {
        self.pending = Duration::ZERO;
        let Some(&first) = self.window.front() else {
            return;
        };

        let (sum, min, max) = self
            .window
            .iter()
            .fold((0.0f32, first, first), |(sum, min, max), &ms| (sum + ms, min.min(ms), max.max(ms)));
        let mean = sum / self.window.len() as f32;

        self.metrics.frame_time_ms = mean;
        self.metrics.fps = if mean > 0.0 { 1000.0 / mean } else { 0.0 };
        self.metrics.min_frame_time_ms = min;
        self.metrics.max_frame_time_ms = max;
    }

    pub fn update_render_stats(&mut self, draw_calls: u32, vertex_count: u32) {
        self.metrics.draw_calls = draw_calls;
        self.metrics.vertex_count = vertex_count;
    }

    pub fn get_metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    /// Window contents in milliseconds, oldest first
    pub fn get_frame_time_history(&self) -> Vec<f32> {
        self.window.iter().copied().collect()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.pending = Duration::ZERO;
        self.metrics = PerformanceMetrics::default();
    }

    /// Compact text shown in the stats overlay element
    pub fn overlay_text(&self) -> String {
        let m = &self.metrics;
        format!(
            "{:.0} FPS ({:.1} ms, {:.1}-{:.1})\n{} draws, {} verts",
            m.fps, m.frame_time_ms, m.min_frame_time_ms, m.max_frame_time_ms, m.draw_calls, m.vertex_count
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_latest_samples() {
        let mut monitor = PerformanceMonitor::with_samples(4);
        for i in 0..10 {
            monitor.record_frame(Duration::from_millis(i));
        }
        assert_eq!(monitor.sample_count(), 4);
        assert_eq!(monitor.get_frame_time_history(), vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(monitor.get_metrics().total_frames, 10);
    }

    #[test]
    fn test_refresh_follows_recorded_time() {
        let mut monitor = PerformanceMonitor::new().with_refresh_interval(Duration::from_millis(50));
        monitor.record_frame(Duration::from_millis(10));
        assert!((monitor.get_metrics().frame_time_ms - 10.0).abs() < 1e-3);

        monitor.record_frame(Duration::from_millis(30));
        assert!((monitor.get_metrics().frame_time_ms - 10.0).abs() < 1e-3);

        monitor.record_frame(Duration::from_millis(20));
        let metrics = monitor.get_metrics();
        assert!((metrics.frame_time_ms - 20.0).abs() < 1e-3);
        assert!((metrics.min_frame_time_ms - 10.0).abs() < 1e-3);
        assert!((metrics.max_frame_time_ms - 30.0).abs() < 1e-3);
        assert!((metrics.fps - 50.0).abs() < 1e-2);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_frame(Duration::from_millis(16));
        monitor.update_render_stats(3, 300);
        monitor.reset();
        assert_eq!(monitor.sample_count(), 0);
        assert_eq!(*monitor.get_metrics(), PerformanceMetrics::default());
    }

    #[test]
    fn test_overlay_text() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_frame(Duration::from_millis(20));
        monitor.update_render_stats(2, 48);
        let text = monitor.overlay_text();
        assert!(text.starts_with("50 FPS"));
        assert!(text.contains("2 draws, 48 verts"));
    }
}
