use crate::config::SessionName;
use crate::error::{RResult, RecorderError};
use crate::frame::CameraPose;
use crate::records::{ImuRecord, PoseRecord, WifiRecord};
use crate::ring_buffer::RingBuffer;
use crate::sensor_receiver::SensorSnapshot;
use crate::wifi_gate::WifiResultGate;
use chrono::Utc;
use crossbeam::channel::{bounded, tick, Sender};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Not recording; buffers hold the previous session, if any
    Idle,
    /// Writing one pose/IMU record per frame plus the gated WiFi rows
    Recording,
}

/// Called with the new elapsed value on every timer tick.
pub type TickCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Background ticker that bumps an elapsed counter once per period.
pub struct ElapsedTimer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedTimer {
    pub fn start(period: Duration, elapsed: Arc<AtomicU64>, on_tick: Option<TickCallback>) -> Self {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let ticker = tick(period);

        let spawned = thread::Builder::new()
            .name("elapsed-timer".to_string())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(ticker) -> _ => {
                        let now = elapsed.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(callback) = &on_tick {
                            callback(now);
                        }
                    }
                    // Fires on explicit cancel or when the sender is dropped.
                    recv(cancel_rx) -> _ => break,
                }
            });

        match spawned {
            Ok(handle) => ElapsedTimer {
                cancel: Some(cancel_tx),
                handle: Some(handle),
            },
            Err(e) => {
                log::warn!("[session] elapsed timer unavailable: {}", e);
                ElapsedTimer {
                    cancel: None,
                    handle: None,
                }
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Session metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_name: Option<String>,
    pub start_time: Option<String>,
    pub state: SessionState,
    pub elapsed_secs: u64,
    pub capacity: usize,
    pub pose_record_count: u64,
    pub wifi_record_count: u64,
}

/// Point-in-time copy of a session's live records, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub metadata: SessionMetadata,
    pub pose: Vec<PoseRecord>,
    pub imu: Vec<ImuRecord>,
    pub wifi: Vec<WifiRecord>,
}

/// What a single frame tick wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWrite {
    /// Slot shared by the pose and IMU records.
    pub pose_slot: usize,
    pub wifi_rows: usize,
}

/// Recording state machine over three fixed-capacity ring buffers.
pub struct RecordingSession {
    state: SessionState,
    name: Option<SessionName>,
    start_time: Option<String>,
    pose: RingBuffer<PoseRecord>,
    imu: RingBuffer<ImuRecord>,
    wifi: RingBuffer<WifiRecord>,
    elapsed_secs: Arc<AtomicU64>,
    timer: Option<ElapsedTimer>,
    tick_period: Duration,
    on_tick: Option<TickCallback>,
}

impl RecordingSession {
    pub fn new(capacity: NonZeroUsize) -> Self {
        RecordingSession {
            state: SessionState::Idle,
            name: None,
            start_time: None,
            pose: RingBuffer::new(capacity),
            imu: RingBuffer::new(capacity),
            wifi: RingBuffer::new(capacity),
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            timer: None,
            tick_period: Duration::from_secs(1),
            on_tick: None,
        }
    }

    /// Override the elapsed-timer period (tests run it faster).
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Receive each elapsed-time tick, e.g. to publish it to the UI.
    pub fn set_tick_callback(&mut self, callback: TickCallback) {
        self.on_tick = Some(callback);
    }

    /// Transition Idle → Recording with fresh counters.
    pub fn start(&mut self, name: &SessionName) -> RResult<()> {
        if self.state == SessionState::Recording {
            return Err(RecorderError::AlreadyRecording);
        }

        self.pose.reset();
        self.imu.reset();
        self.wifi.reset();
        self.elapsed_secs.store(0, Ordering::SeqCst);
        self.name = Some(name.clone());
        self.start_time = Some(Utc::now().to_rfc3339());

        self.timer = Some(ElapsedTimer::start(
            self.tick_period,
            Arc::clone(&self.elapsed_secs),
            self.on_tick.clone(),
        ));
        self.state = SessionState::Recording;

        log::info!("[session] recording '{}' started", name);
        Ok(())
    }

    /// Transition Recording → Idle. Buffers, counters and elapsed time are
    /// kept until the next `start`.
    pub fn stop(&mut self) -> RResult<()> {
        if self.state == SessionState::Idle {
            return Err(RecorderError::NotRecording);
        }

        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.state = SessionState::Idle;

        log::info!(
            "[session] recording stopped after {}s: {} pose rows, {} wifi rows",
            self.elapsed_secs(),
            self.pose_counter(),
            self.wifi_counter()
        );
        Ok(())
    }

    /// Append one pose row, one IMU row and one WiFi row per gated AP.
    ///
    /// Returns `None` without touching anything while Idle.
    pub fn on_frame_tick(
        &mut self,
        timestamp: i64,
        pose: &CameraPose,
        tracking_state: &str,
        sensors: &SensorSnapshot,
        wifi: &WifiResultGate,
    ) -> Option<FrameWrite> {
        if self.state != SessionState::Recording {
            return None;
        }

        let pose_slot = self.pose.push(PoseRecord {
            timestamp,
            position: pose.translation,
            orientation: pose.rotation,
            tracking_state: tracking_state.to_string(),
        });
        self.imu.push(ImuRecord {
            timestamp,
            magnetometer: sensors.magnetometer,
            accelerometer: sensors.accelerometer,
            gyroscope: sensors.gyroscope,
            rotation_vector: sensors.rotation_vector,
        });

        let scan = wifi.current();
        for ap in &scan.results {
            self.wifi.push(WifiRecord {
                timestamp,
                successful_timestamp: scan.timestamp,
                rssi: ap.rssi,
                ssid: ap.ssid.clone(),
                bssid: ap.bssid.clone(),
                frequency_mhz: ap.frequency_mhz,
                last_seen: ap.last_seen,
            });
        }

        Some(FrameWrite {
            pose_slot,
            wifi_rows: scan.results.len(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn name(&self) -> Option<&SessionName> {
        self.name.as_ref()
    }

    /// Frames written this session (pose and IMU rows share it).
    pub fn pose_counter(&self) -> u64 {
        self.pose.counter()
    }

    pub fn wifi_counter(&self) -> u64 {
        self.wifi.counter()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.pose.capacity()
    }

    pub fn pose_records(&self) -> &RingBuffer<PoseRecord> {
        &self.pose
    }

    pub fn imu_records(&self) -> &RingBuffer<ImuRecord> {
        &self.imu
    }

    pub fn wifi_records(&self) -> &RingBuffer<WifiRecord> {
        &self.wifi
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            session_name: self.name.as_ref().map(|n| n.to_string()),
            start_time: self.start_time.clone(),
            state: self.state,
            elapsed_secs: self.elapsed_secs(),
            capacity: self.capacity(),
            pose_record_count: self.pose_counter(),
            wifi_record_count: self.wifi_counter(),
        }
    }

    /// Copy the live contents for export; the session keeps its buffers.
    pub fn snapshot(&self) -> SessionData {
        SessionData {
            metadata: self.metadata(),
            pose: self.pose.to_vec(),
            imu: self.imu.to_vec(),
            wifi: self.wifi.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SsidFilter;
    use crate::wifi_gate::AccessPoint;

    fn session(capacity: usize) -> RecordingSession {
        RecordingSession::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn name(raw: &str) -> SessionName {
        SessionName::parse(raw).unwrap()
    }

    fn gate_with(ssids: &[&str], scan_ts: i64) -> WifiResultGate {
        let gate = WifiResultGate::new();
        let results = ssids
            .iter()
            .enumerate()
            .map(|(i, ssid)| AccessPoint {
                ssid: ssid.to_string(),
                bssid: format!("aa:bb:cc:dd:ee:{:02x}", i),
                rssi: -40 - i as i32,
                frequency_mhz: 2437,
                last_seen: scan_ts * 1000,
            })
            .collect();
        gate.submit(results, scan_ts, &SsidFilter::new(".*").unwrap());
        gate
    }

    fn tick(session: &mut RecordingSession, ts: i64, gate: &WifiResultGate) -> Option<FrameWrite> {
        session.on_frame_tick(
            ts,
            &CameraPose::identity(),
            "TRACKING",
            &SensorSnapshot::default(),
            gate,
        )
    }

    #[test]
    fn test_session_state_transitions() {
        let mut session = session(8);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_recording());

        session.start(&name("walk")).unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        assert_eq!(session.name().map(|n| n.as_str()), Some("walk"));

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_invalid_state_transitions() {
        let mut session = session(8);
        assert_eq!(session.stop(), Err(RecorderError::NotRecording));

        session.start(&name("a")).unwrap();
        assert_eq!(session.start(&name("b")), Err(RecorderError::AlreadyRecording));
        // The running session was not replaced.
        assert_eq!(session.name().map(|n| n.as_str()), Some("a"));
        session.stop().unwrap();
    }

    #[test]
    fn test_idle_tick_is_noop() {
        let mut session = session(8);
        let gate = gate_with(&["TA-1", "TA-2"], 1);

        assert_eq!(tick(&mut session, 100, &gate), None);
        assert_eq!(session.pose_counter(), 0);
        assert_eq!(session.wifi_counter(), 0);
        assert!(session.pose_records().is_empty());
        assert!(session.imu_records().is_empty());
        assert!(session.wifi_records().is_empty());
    }

    #[test]
    fn test_frame_fans_out_wifi_rows() {
        let mut session = session(16);
        let gate = gate_with(&["TA-1", "TA-2", "TA-3"], 42);
        session.start(&name("fanout")).unwrap();

        let write = tick(&mut session, 1000, &gate).unwrap();
        assert_eq!(write, FrameWrite { pose_slot: 0, wifi_rows: 3 });
        assert_eq!(session.pose_counter(), 1);
        assert_eq!(session.imu_records().len(), 1);
        assert_eq!(session.wifi_counter(), 3);

        let wifi = session.wifi_records().to_vec();
        assert!(wifi.iter().all(|w| w.timestamp == 1000));
        assert!(wifi.iter().all(|w| w.successful_timestamp == 42));
        assert_eq!(wifi[2].ssid, "TA-3");
        assert_eq!(wifi[0].last_seen, 42_000);
        session.stop().unwrap();
    }

    #[test]
    fn test_records_carry_frame_inputs() {
        let mut session = session(4);
        let gate = WifiResultGate::new();
        session.start(&name("inputs")).unwrap();

        let pose = CameraPose::new([1.0, 2.0, 3.0], [0.1, 0.2, 0.3, 0.9]);
        let mut sensors = SensorSnapshot::default();
        sensors.accelerometer = [0.0, 9.81, 0.0];
        sensors.rotation_vector = [0.0, 0.0, 0.7, 0.7];
        session.on_frame_tick(77, &pose, "PAUSED", &sensors, &gate);

        let pose_row = session.pose_records().get(0).unwrap();
        assert_eq!(pose_row.position, [1.0, 2.0, 3.0]);
        assert_eq!(pose_row.orientation, [0.1, 0.2, 0.3, 0.9]);
        assert_eq!(pose_row.tracking_state, "PAUSED");

        let imu_row = session.imu_records().get(0).unwrap();
        assert_eq!(imu_row.timestamp, 77);
        assert_eq!(imu_row.accelerometer, [0.0, 9.81, 0.0]);
        assert_eq!(imu_row.rotation_vector, [0.0, 0.0, 0.7, 0.7]);
        assert_eq!(session.wifi_counter(), 0);
        session.stop().unwrap();
    }

    #[test]
    fn test_restart_resets_counters_and_overwrites() {
        let capacity = 4;
        let mut session = session(capacity);
        let gate = gate_with(&["TA-1"], 1);

        session.start(&name("a")).unwrap();
        for ts in 0..6 {
            tick(&mut session, ts, &gate);
        }
        session.stop().unwrap();
        // Contents stay readable after stop.
        assert_eq!(session.pose_counter(), 6);
        assert_eq!(session.pose_records().len(), capacity);

        session.start(&name("b")).unwrap();
        assert_eq!(session.pose_counter(), 0);
        assert_eq!(session.wifi_counter(), 0);
        assert!(session.snapshot().pose.is_empty());

        for ts in 100..(100 + capacity as i64) {
            tick(&mut session, ts, &gate);
        }
        let pose: Vec<i64> = session.pose_records().iter().map(|p| p.timestamp).collect();
        assert_eq!(pose, vec![100, 101, 102, 103]);
        let wifi: Vec<i64> = session.wifi_records().iter().map(|w| w.timestamp).collect();
        assert_eq!(wifi, vec![100, 101, 102, 103]);
        session.stop().unwrap();
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let mut session = session(8);
        let gate = gate_with(&["TA-1", "TA-2"], 3);
        session.start(&name("snap")).unwrap();
        tick(&mut session, 1, &gate);

        let snapshot = session.snapshot();
        tick(&mut session, 2, &gate);

        assert_eq!(snapshot.pose.len(), 1);
        assert_eq!(snapshot.wifi.len(), 2);
        assert_eq!(snapshot.metadata.pose_record_count, 1);
        assert_eq!(snapshot.metadata.session_name.as_deref(), Some("snap"));
        assert_eq!(session.pose_counter(), 2);
        session.stop().unwrap();
    }

    #[test]
    fn test_elapsed_timer_ticks_and_stops() {
        let ticks = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&ticks);
        let mut session = session(4).with_tick_period(Duration::from_millis(10));
        session.set_tick_callback(Arc::new(move |secs| {
            seen.store(secs, Ordering::SeqCst);
        }));

        session.start(&name("timer")).unwrap();
        thread::sleep(Duration::from_millis(120));
        session.stop().unwrap();

        let elapsed = session.elapsed_secs();
        assert!(elapsed >= 1);
        assert_eq!(ticks.load(Ordering::SeqCst), elapsed);

        // No more ticks once stopped; value retained.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(session.elapsed_secs(), elapsed);

        session.tick_period = Duration::from_secs(60);
        session.start(&name("timer2")).unwrap();
        assert_eq!(session.elapsed_secs(), 0);
        session.stop().unwrap();
    }
}
