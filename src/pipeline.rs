//! Composition root: one call per camera frame drives projection, previews
//! and, while recording, the session buffers.

use crate::config::{RecorderConfig, SessionName, SsidFilter};
use crate::error::{RResult, RecorderError};
use crate::events::{EventSink, PipelineEvent};
use crate::frame::{ArFrame, ScreenSize};
use crate::projection::{FrameProjection, FrameProjector};
use crate::sensor_receiver::SensorSampleAggregator;
use crate::session::{FrameWrite, RecordingSession, SessionState};
use crate::storage::{spawn_export, ExportJob, ExportReport, RecordStore};
use crate::wifi_gate::{AccessPoint, WifiResultGate};
use chrono::Utc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Port to the platform WiFi scanner. Results come back later through a
/// [`WifiIngest`]; only the request itself can fail synchronously.
pub trait WifiScanner: Send + Sync {
    fn request_scan(&self) -> RResult<()>;
}

/// Cloneable entry point for scan completions, usable from any thread.
#[derive(Clone)]
pub struct WifiIngest {
    gate: Arc<WifiResultGate>,
    filter: Arc<RwLock<SsidFilter>>,
    events: Arc<dyn EventSink>,
}

impl WifiIngest {
    /// Gate and filter a completed scan with the currently configured
    /// pattern. Returns the detected AP count when the scan was accepted.
    pub fn submit(&self, results: Vec<AccessPoint>, scan_timestamp: i64) -> Option<usize> {
        let filter = self
            .filter
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let accepted = self.gate.submit(results, scan_timestamp, &filter);
        if let Some(count) = accepted {
            self.events.publish(PipelineEvent::DetectedApCount(count));
        }
        accepted
    }
}

/// Result of one frame.
#[derive(Debug)]
pub struct FrameOutcome {
    pub projection: FrameProjection,
    pub fps: Option<u32>,
    /// Set when the frame was recorded.
    pub write: Option<FrameWrite>,
    /// Set when a scan failure stopped the recording on this frame.
    pub stopped_by: Option<RecorderError>,
}

/// A recording that has been stopped, with the export started for it.
#[derive(Debug)]
pub struct StoppedRecording {
    /// The buffers are kept either way; [`RecordingPipeline::export_last_session`]
    /// can retry.
    pub export: RResult<ExportJob>,
}

impl StoppedRecording {
    /// Block until the export finishes.
    pub fn wait(self) -> RResult<ExportReport> {
        self.export?.wait()
    }
}

pub struct RecordingPipeline {
    projector: FrameProjector,
    session: RecordingSession,
    sensors: Arc<SensorSampleAggregator>,
    gate: Arc<WifiResultGate>,
    filter: Arc<RwLock<SsidFilter>>,
    events: Arc<dyn EventSink>,
    scanner: Box<dyn WifiScanner>,
    store: Arc<dyn RecordStore>,
    show_point_cloud: bool,
    show_debug: bool,
    // Toggle value to restore once recording stops.
    point_cloud_before_recording: Option<bool>,
    last_frame_ns: Option<i64>,
}

impl RecordingPipeline {
    pub fn new(
        config: &RecorderConfig,
        events: Arc<dyn EventSink>,
        scanner: Box<dyn WifiScanner>,
        store: Arc<dyn RecordStore>,
    ) -> RResult<Self> {
        Self::with_tick_period(config, events, scanner, store, Duration::from_secs(1))
    }

    /// Like [`RecordingPipeline::new`] with a custom elapsed-timer period.
    pub fn with_tick_period(
        config: &RecorderConfig,
        events: Arc<dyn EventSink>,
        scanner: Box<dyn WifiScanner>,
        store: Arc<dyn RecordStore>,
        tick_period: Duration,
    ) -> RResult<Self> {
        let (filter, capacity) = config.validate()?;

        let mut session = RecordingSession::new(capacity).with_tick_period(tick_period);
        let tick_events = Arc::clone(&events);
        session.set_tick_callback(Arc::new(move |secs| {
            tick_events.publish(PipelineEvent::ElapsedSeconds(secs));
        }));

        let pipeline = RecordingPipeline {
            projector: FrameProjector::new(),
            session,
            sensors: Arc::new(SensorSampleAggregator::new()),
            gate: Arc::new(WifiResultGate::new()),
            filter: Arc::new(RwLock::new(filter)),
            events,
            scanner,
            store,
            show_point_cloud: config.show_point_cloud,
            show_debug: config.show_debug,
            point_cloud_before_recording: None,
            last_frame_ns: None,
        };

        // Initial state for observers.
        pipeline
            .events
            .publish(PipelineEvent::SsidPattern(config.ssid_pattern.clone()));
        pipeline
            .events
            .publish(PipelineEvent::ShowPointCloud(pipeline.show_point_cloud));
        pipeline
            .events
            .publish(PipelineEvent::ShowDebug(pipeline.show_debug));
        Ok(pipeline)
    }

    /// Shared handle for the inertial sensor callbacks.
    pub fn sensors(&self) -> Arc<SensorSampleAggregator> {
        Arc::clone(&self.sensors)
    }

    pub fn wifi_ingest(&self) -> WifiIngest {
        WifiIngest {
            gate: Arc::clone(&self.gate),
            filter: Arc::clone(&self.filter),
            events: Arc::clone(&self.events),
        }
    }

    pub fn wifi_gate(&self) -> &WifiResultGate {
        &self.gate
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn show_point_cloud(&self) -> bool {
        self.show_point_cloud
    }

    pub fn show_debug(&self) -> bool {
        self.show_debug
    }

    pub fn ssid_pattern(&self) -> String {
        self.filter
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pattern()
            .to_string()
    }

    /// Replace the SSID pattern. An invalid pattern leaves the old one active.
    pub fn set_ssid_pattern(&self, pattern: &str) -> RResult<()> {
        let filter = SsidFilter::new(pattern)?;
        *self
            .filter
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = filter;
        self.events
            .publish(PipelineEvent::SsidPattern(pattern.to_string()));
        Ok(())
    }

    pub fn set_show_point_cloud(&mut self, show: bool) {
        self.show_point_cloud = show;
        self.events.publish(PipelineEvent::ShowPointCloud(show));
    }

    pub fn set_show_debug(&mut self, show: bool) {
        self.show_debug = show;
        self.events.publish(PipelineEvent::ShowDebug(show));
    }

    pub fn start_recording(&mut self, raw_name: &str) -> RResult<()> {
        let name = SessionName::parse(raw_name)?;
        self.session.start(&name)?;

        self.events
            .publish(PipelineEvent::SessionName(name.to_string()));
        self.events.publish(PipelineEvent::RecordingChanged(true));

        // Point-cloud drawing is suspended for the duration of a recording.
        self.point_cloud_before_recording = Some(self.show_point_cloud);
        self.set_show_point_cloud(false);
        Ok(())
    }

    /// Stop recording and export the session in the background.
    ///
    /// `Err` means the session was not stopped. Once stopped, a failure to
    /// start the export is carried in [`StoppedRecording::export`].
    pub fn stop_recording(&mut self) -> RResult<StoppedRecording> {
        self.halt()?;
        let export = self.export_last_session();
        if let Err(e) = &export {
            self.events.publish(PipelineEvent::Error(e.to_string()));
        }
        Ok(StoppedRecording { export })
    }

    fn halt(&mut self) -> RResult<()> {
        self.session.stop()?;
        self.events.publish(PipelineEvent::RecordingChanged(false));
        if let Some(show) = self.point_cloud_before_recording.take() {
            self.set_show_point_cloud(show);
        }
        Ok(())
    }

    /// Export the buffers of the last finished session. Can be repeated,
    /// e.g. after a storage failure, until the next recording starts.
    pub fn export_last_session(&self) -> RResult<ExportJob> {
        if self.session.is_recording() {
            return Err(RecorderError::AlreadyRecording);
        }
        if self.session.name().is_none() {
            return Err(RecorderError::Persistence(
                "no recorded session to export".to_string(),
            ));
        }

        let data = self.session.snapshot();
        let events = Arc::clone(&self.events);
        spawn_export(
            Arc::clone(&self.store),
            data,
            Utc::now().timestamp_millis(),
            move |result| match result {
                Ok(report) => events.publish(PipelineEvent::ExportFinished {
                    files: report.files.clone(),
                    ok: true,
                }),
                Err(e) => {
                    events.publish(PipelineEvent::Error(e.to_string()));
                    events.publish(PipelineEvent::ExportFinished {
                        files: Vec::new(),
                        ok: false,
                    });
                }
            },
        )
    }

    /// Report an acquisition failure (AR frame error, asynchronous scan
    /// failure). An active recording is stopped; its buffers are kept.
    pub fn fail_acquisition(&mut self, err: RecorderError) -> RecorderError {
        let err = match err {
            RecorderError::Acquisition(_) => err,
            other => RecorderError::Acquisition(other.to_string()),
        };

        self.events.publish(PipelineEvent::Error(err.to_string()));
        if self.session.is_recording() {
            log::warn!("[pipeline] stopping recording: {}", err);
            let _ = self.halt();
        }
        err
    }

    /// Process one camera frame. `timestamp_ms` is the wall-clock time stamped
    /// onto recorded rows.
    pub fn process_frame(&mut self, frame: &ArFrame, screen: ScreenSize, timestamp_ms: i64) -> FrameOutcome {
        let mut stopped_by = None;
        if self.session.is_recording() {
            if let Err(e) = self.scanner.request_scan() {
                stopped_by = Some(self.fail_acquisition(e));
            }
        }

        let fps = self.update_fps(frame.timestamp_ns);
        if let Some(fps) = fps {
            self.events.publish(PipelineEvent::Fps(fps));
        }

        let projection = self.projector.process(frame, screen, self.show_point_cloud);
        self.events
            .publish(PipelineEvent::TrackingState(projection.tracking_state.clone()));
        self.events
            .publish(PipelineEvent::FeatureCount(projection.feature_count));
        if let Some(points) = &projection.points {
            self.events
                .publish(PipelineEvent::ProjectedPoints(points.clone()));
        }

        let snapshot = self.sensors.snapshot();
        self.events.publish(PipelineEvent::PosePreview {
            translation: frame.pose.translation,
            rotation: frame.pose.rotation,
        });
        self.events
            .publish(PipelineEvent::RotationVector(snapshot.rotation_vector));
        if !self.session.is_recording() {
            self.events.publish(PipelineEvent::ImuPreview(snapshot));
        }

        let write = self.session.on_frame_tick(
            timestamp_ms,
            &frame.pose,
            &projection.tracking_state,
            &snapshot,
            &self.gate,
        );

        FrameOutcome {
            projection,
            fps,
            write,
            stopped_by,
        }
    }

    fn update_fps(&mut self, timestamp_ns: i64) -> Option<u32> {
        let fps = self.last_frame_ns.and_then(|last| {
            let delta = timestamp_ns - last;
            (delta > 0).then(|| (1e9 / delta as f64) as u32)
        });
        self.last_frame_ns = Some(timestamp_ns);
        fps
    }
}
