use crate::events::{EventSink, PipelineEvent};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Latest value of every observable, folded from pipeline events.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub recording: bool,
    pub elapsed_seconds: u64,
    pub elapsed_display: String,
    pub fps: u32,
    pub tracking_state: String,
    pub feature_count: usize,
    pub detected_ap_count: usize,
    pub projected_point_count: usize,
    pub session_name: String,
    pub ssid_pattern: String,
    pub show_point_cloud: bool,
    pub show_debug: bool,
    // Previews
    pub pose_translation: [f32; 3],
    pub pose_rotation: [f32; 4],
    pub magnetometer: [f32; 3],
    pub accelerometer: [f32; 3],
    pub gyroscope: [f32; 3],
    pub rotation_vector: [f32; 4],
    // Errors and exports
    pub last_error: Option<String>,
    pub last_export: Vec<String>,
    pub last_export_ok: Option<bool>,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            recording: false,
            elapsed_seconds: 0,
            elapsed_display: format_elapsed(0),
            fps: 0,
            tracking_state: String::new(),
            feature_count: 0,
            detected_ap_count: 0,
            projected_point_count: 0,
            session_name: String::new(),
            ssid_pattern: String::new(),
            show_point_cloud: true,
            show_debug: true,
            pose_translation: [0.0; 3],
            pose_rotation: [0.0, 0.0, 0.0, 1.0],
            magnetometer: [0.0; 3],
            accelerometer: [0.0; 3],
            gyroscope: [0.0; 3],
            rotation_vector: [0.0; 4],
            last_error: None,
            last_export: Vec::new(),
            last_export_ok: None,
        }
    }

    pub fn apply(&mut self, event: &PipelineEvent) {
        self.timestamp = current_timestamp();
        match event {
            PipelineEvent::RecordingChanged(on) => {
                self.recording = *on;
                if *on {
                    self.elapsed_seconds = 0;
                    self.elapsed_display = format_elapsed(0);
                }
            }
            PipelineEvent::ElapsedSeconds(secs) => {
                self.elapsed_seconds = *secs;
                self.elapsed_display = format_elapsed(*secs);
            }
            PipelineEvent::Fps(fps) => self.fps = *fps,
            PipelineEvent::TrackingState(state) => self.tracking_state = state.clone(),
            PipelineEvent::FeatureCount(count) => self.feature_count = *count,
            PipelineEvent::DetectedApCount(count) => self.detected_ap_count = *count,
            PipelineEvent::ProjectedPoints(points) => self.projected_point_count = points.len(),
            PipelineEvent::PosePreview {
                translation,
                rotation,
            } => {
                self.pose_translation = *translation;
                self.pose_rotation = *rotation;
            }
            PipelineEvent::ImuPreview(snapshot) => {
                self.magnetometer = snapshot.magnetometer;
                self.accelerometer = snapshot.accelerometer;
                self.gyroscope = snapshot.gyroscope;
            }
            PipelineEvent::RotationVector(rv) => self.rotation_vector = *rv,
            PipelineEvent::ShowPointCloud(show) => self.show_point_cloud = *show,
            PipelineEvent::ShowDebug(show) => self.show_debug = *show,
            PipelineEvent::SessionName(name) => self.session_name = name.clone(),
            PipelineEvent::SsidPattern(pattern) => self.ssid_pattern = pattern.clone(),
            PipelineEvent::Error(message) => self.last_error = Some(message.clone()),
            PipelineEvent::ExportFinished { files, ok } => {
                self.last_export = files.clone();
                self.last_export_ok = Some(*ok);
            }
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that keeps a [`LiveStatus`] current and optionally forwards events.
pub struct LiveStatusSink {
    status: Mutex<LiveStatus>,
    forward: Option<Box<dyn EventSink>>,
}

impl LiveStatusSink {
    pub fn new() -> Self {
        LiveStatusSink {
            status: Mutex::new(LiveStatus::new()),
            forward: None,
        }
    }

    pub fn forwarding_to(sink: Box<dyn EventSink>) -> Self {
        LiveStatusSink {
            status: Mutex::new(LiveStatus::new()),
            forward: Some(sink),
        }
    }

    pub fn status(&self) -> LiveStatus {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for LiveStatusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LiveStatusSink {
    fn publish(&self, event: PipelineEvent) {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply(&event);
        if let Some(forward) = &self.forward {
            forward.publish(event);
        }
    }
}

/// "mm:ss", minutes wrapping every hour.
pub fn format_elapsed(seconds: u64) -> String {
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{:02}:{:02}", m, s)
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
