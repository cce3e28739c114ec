//! # Frame Statistics
//!
//! Rolling frame-interval window plus draw and error counters, summarized
//! through `log::debug!` about once per second.

use std::collections::VecDeque;

const MAX_SAMPLES: usize = 120;
const REPORT_INTERVAL_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSummary {
    pub fps: f64,
    pub average_frame_ms: f64,
    pub max_frame_ms: f64,
    pub draw_calls: u32,
    pub failed_frames: u64,
}

pub struct FrameStats {
    /// Intervals between recent frames, in milliseconds
    frame_times: VecDeque<f64>,
    last_frame_ms: Option<f64>,
    last_report_ms: Option<f64>,
    draw_calls: u32,
    failed_frames: u64,
    total_frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(MAX_SAMPLES),
            last_frame_ms: None,
            last_report_ms: None,
            draw_calls: 0,
            failed_frames: 0,
            total_frames: 0,
        }
    }

    /// Records a finished frame at host time `now_ms`
    pub fn record_frame(&mut self, now_ms: f64, draw_calls: u32, failed: bool) {
        if let Some(last) = self.last_frame_ms {
            if self.frame_times.len() >= MAX_SAMPLES {
                self.frame_times.pop_front();
            }
            self.frame_times.push_back((now_ms - last).max(0.0));
        }
        self.last_frame_ms = Some(now_ms);
        self.draw_calls = draw_calls;
        self.total_frames += 1;
        if failed {
            self.failed_frames += 1;
        }

        let due = self
            .last_report_ms
            .map_or(true, |last| now_ms - last >= REPORT_INTERVAL_MS);
        if due {
            self.last_report_ms = Some(now_ms);
            let summary = self.summary();
            log::debug!(
                "{:.1} fps ({:.2} ms avg, {:.2} ms max), {} draws, {} failed of {} frames",
                summary.fps,
                summary.average_frame_ms,
                summary.max_frame_ms,
                summary.draw_calls,
                summary.failed_frames,
                self.total_frames
            );
        }
    }

    pub fn summary(&self) -> FrameSummary {
        let count = self.frame_times.len();
        let average = if count == 0 {
            0.0
        } else {
            self.frame_times.iter().sum::<f64>() / count as f64
        };
        FrameSummary {
            fps: if average > 0.0 { 1000.0 / average } else { 0.0 },
            average_frame_ms: average,
            max_frame_ms: self.frame_times.iter().copied().fold(0.0, f64::max),
            draw_calls: self.draw_calls,
            failed_frames: self.failed_frames,
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}
