//! Push-based observable state for whatever renders the recorder.
//!
//! The core never talks to a UI directly; it publishes [`PipelineEvent`]s
//! to an [`EventSink`].

use crate::frame::ScreenPoint;
use crate::sensor_receiver::SensorSnapshot;
use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
    RecordingChanged(bool),
    ElapsedSeconds(u64),
    Fps(u32),
    TrackingState(String),
    FeatureCount(usize),
    DetectedApCount(usize),
    ProjectedPoints(Vec<ScreenPoint>),
    PosePreview {
        translation: [f32; 3],
        rotation: [f32; 4],
    },
    /// Magnetometer/accelerometer/gyroscope preview, only while idle.
    ImuPreview(SensorSnapshot),
    RotationVector([f32; 4]),
    ShowPointCloud(bool),
    ShowDebug(bool),
    SessionName(String),
    SsidPattern(String),
    Error(String),
    ExportFinished {
        files: Vec<String>,
        ok: bool,
    },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: PipelineEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: PipelineEvent) {}
}

/// Forwards events over an unbounded crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = unbounded();
        (ChannelSink { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: PipelineEvent) {
        // Nobody listening is not an error for the recorder.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, rx) = ChannelSink::new();
        sink.publish(PipelineEvent::Fps(30));
        sink.publish(PipelineEvent::RecordingChanged(true));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![PipelineEvent::Fps(30), PipelineEvent::RecordingChanged(true)]
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(PipelineEvent::Fps(1));
    }
}
