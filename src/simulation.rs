//! Synthetic collaborators for running the recorder without a device.
//!
//! Everything here is deterministic in its inputs so that runs and tests
//! are reproducible.

use crate::config::{FAR_PLANE, NEAR_PLANE};
use crate::error::{RResult, RecorderError};
use crate::frame::{ArFrame, CameraPose, ScreenSize};
use crate::pipeline::WifiScanner;
use crate::projection::{perspective, to_column_array};
use crate::sensor_receiver::SensorChannel;
use crate::wifi_gate::AccessPoint;
use nalgebra::{Isometry3, Point3, Vector3};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Camera walking a circle around a cluster of landmarks, always facing the
/// centre.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    screen: ScreenSize,
    fovy_rad: f32,
    radius: f32,
    height: f32,
    lap_secs: f64,
    landmarks: Vec<[f32; 3]>,
}

impl SyntheticCamera {
    pub fn new(screen: ScreenSize) -> Self {
        // 5x5 grid of landmarks, gently curved, centred on (0, 1, 0).
        let mut landmarks = Vec::with_capacity(25);
        for i in -2..=2 {
            for j in -2..=2 {
                landmarks.push([i as f32 * 0.4, 1.0 + j as f32 * 0.4, (i * j) as f32 * 0.1]);
            }
        }

        SyntheticCamera {
            screen,
            fovy_rad: 60f32.to_radians(),
            radius: 4.0,
            height: 1.5,
            lap_secs: 60.0,
            landmarks,
        }
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.len()
    }

    /// Frame at `t_secs` into the walk, stamped with `timestamp_ns`.
    pub fn frame(&self, t_secs: f64, timestamp_ns: i64) -> ArFrame {
        let angle = (2.0 * PI * t_secs / self.lap_secs) as f32;
        let eye = Point3::new(
            self.radius * angle.cos(),
            self.height,
            self.radius * angle.sin(),
        );
        let target = Point3::new(0.0, 1.0, 0.0);

        let view = Isometry3::look_at_rh(&eye, &target, &Vector3::y());
        let pose = view.inverse();
        let t = pose.translation.vector;
        let q = pose.rotation.coords;

        let point_cloud = self
            .landmarks
            .iter()
            .enumerate()
            .flat_map(|(i, p)| {
                let confidence = 0.5 + (i % 5) as f32 * 0.1;
                [p[0], p[1], p[2], confidence]
            })
            .collect();

        ArFrame {
            timestamp_ns,
            pose: CameraPose::new([t.x, t.y, t.z], [q.x, q.y, q.z, q.w]),
            view_matrix: to_column_array(&view.to_homogeneous()),
            projection_matrix: perspective(self.fovy_rad, self.screen.aspect(), NEAR_PLANE, FAR_PLANE),
            tracking_state: "TRACKING".to_string(),
            point_cloud,
        }
    }
}

/// One reading for `channel` at `t_secs`.
pub fn mock_sensor_event(channel: SensorChannel, t_secs: f64) -> Vec<f32> {
    let values = match channel {
        SensorChannel::Magnetometer => vec![
            22.0 + (t_secs * 0.2).sin() * 3.0,
            -5.0 + (t_secs * 0.1).cos() * 2.0,
            -40.0 + (t_secs * 0.05).sin(),
        ],
        SensorChannel::Accelerometer => vec![
            (t_secs * 2.0 * PI).sin() * 0.5,
            9.81 + (t_secs * PI).sin() * 0.1,
            (t_secs * 2.0 * PI).cos() * 0.3,
        ],
        SensorChannel::Gyroscope => vec![
            (t_secs * 0.5).sin() * 0.05,
            2.0 * PI / 60.0 + (t_secs * 0.3).cos() * 0.03,
            (t_secs * 1.0).sin() * 0.1,
        ],
        SensorChannel::RotationVector => {
            let half = t_secs * PI / 60.0;
            vec![0.0, half.sin(), 0.0, half.cos()]
        }
    };
    values.into_iter().map(|v| v as f32).collect()
}

/// Access points visible on scan number `seq`. Half are named `TA-*`.
pub fn mock_scan(seq: u64, timestamp_ms: i64) -> Vec<AccessPoint> {
    let names = ["TA-lobby", "TA-lab", "TA-hall", "eduroam", "guest", "printer-3F"];
    names
        .iter()
        .enumerate()
        .map(|(i, ssid)| {
            let wobble = ((seq as f64 + i as f64) * 0.7).sin() * 6.0;
            AccessPoint {
                ssid: ssid.to_string(),
                bssid: format!("02:00:00:00:{:02x}:{:02x}", i, i * 17),
                rssi: -45 - (i as i32) * 7 + wobble as i32,
                frequency_mhz: if i % 2 == 0 { 2412 + 5 * i as i32 } else { 5180 + 20 * i as i32 },
                last_seen: timestamp_ms - (i as i64) * 15,
            }
        })
        .collect()
}

/// Scanner that counts requests and can be told to start refusing them.
///
/// Clones share their counters, so one clone can be boxed into the pipeline
/// while another drives the scan loop.
#[derive(Debug, Clone, Default)]
pub struct MockWifiScanner {
    requests: Arc<AtomicU64>,
    fail_after: Option<u64>,
}

impl MockWifiScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every request after the first `n`.
    pub fn failing_after(n: u64) -> Self {
        MockWifiScanner {
            requests: Arc::new(AtomicU64::new(0)),
            fail_after: Some(n),
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl WifiScanner for MockWifiScanner {
    fn request_scan(&self) -> RResult<()> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_after {
            Some(limit) if n > limit => Err(RecorderError::Acquisition(format!(
                "scan request {} refused",
                n
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SsidFilter;
    use crate::projection::FrameProjector;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_sees_landmarks() {
        let screen = ScreenSize::new(1080, 1920);
        let camera = SyntheticCamera::new(screen);
        let frame = camera.frame(7.5, 7_500_000_000);

        let projection = FrameProjector::new().process(&frame, screen, true);
        assert_eq!(projection.feature_count, camera.landmark_count());
        let points = projection.points.unwrap();
        assert_eq!(points.len(), camera.landmark_count());
        assert!(points
            .iter()
            .all(|p| p.x >= 0 && p.x < 1080 && p.y >= 0 && p.y < 1920));
    }

    #[test]
    fn test_camera_walks_a_circle() {
        let camera = SyntheticCamera::new(ScreenSize::new(100, 100));
        for t in [0.0, 10.0, 33.0] {
            let [x, y, z] = camera.frame(t, 0).pose.translation;
            assert_relative_eq!((x * x + z * z).sqrt(), 4.0, epsilon = 1e-4);
            assert_relative_eq!(y, 1.5, epsilon = 1e-4);
        }
        let q = camera.frame(3.0, 0).pose.rotation;
        let norm = q.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_mock_sensor_widths() {
        for channel in SensorChannel::ALL {
            assert_eq!(mock_sensor_event(channel, 1.25).len(), channel.width());
        }
    }

    #[test]
    fn test_mock_scan_mixes_ssids() {
        let filter = SsidFilter::new("TA.*").unwrap();
        let scan = mock_scan(3, 10_000);
        assert_eq!(scan.len(), 6);
        assert_eq!(scan.iter().filter(|ap| filter.matches(&ap.ssid)).count(), 3);
        assert!(scan.iter().all(|ap| ap.last_seen <= 10_000));
    }

    #[test]
    fn test_mock_scanner_failure_injection() {
        let scanner = MockWifiScanner::failing_after(2);
        let shared = scanner.clone();
        assert!(scanner.request_scan().is_ok());
        assert!(scanner.request_scan().is_ok());
        assert!(matches!(
            scanner.request_scan(),
            Err(RecorderError::Acquisition(_))
        ));
        assert_eq!(shared.requests(), 3);
    }
}
