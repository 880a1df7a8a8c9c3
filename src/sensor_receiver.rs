use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Raw inertial channels, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorChannel {
    Magnetometer,
    Accelerometer,
    Gyroscope,
    RotationVector,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 4] = [
        SensorChannel::Magnetometer,
        SensorChannel::Accelerometer,
        SensorChannel::Gyroscope,
        SensorChannel::RotationVector,
    ];

    /// Number of values kept for this channel.
    pub fn width(&self) -> usize {
        match self {
            SensorChannel::RotationVector => 4,
            _ => 3,
        }
    }

    fn index(&self) -> usize {
        match self {
            SensorChannel::Magnetometer => 0,
            SensorChannel::Accelerometer => 1,
            SensorChannel::Gyroscope => 2,
            SensorChannel::RotationVector => 3,
        }
    }
}

/// Latest value of every channel at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub magnetometer: [f32; 3],
    pub accelerometer: [f32; 3],
    pub gyroscope: [f32; 3],
    pub rotation_vector: [f32; 4],
}

pub const SNAPSHOT_LEN: usize = 13;

impl SensorSnapshot {
    /// Flat composite: magnetometer, accelerometer, gyroscope, rotation vector.
    pub fn to_array(&self) -> [f32; SNAPSHOT_LEN] {
        let mut out = [0.0; SNAPSHOT_LEN];
        out[0..3].copy_from_slice(&self.magnetometer);
        out[3..6].copy_from_slice(&self.accelerometer);
        out[6..9].copy_from_slice(&self.gyroscope);
        out[9..13].copy_from_slice(&self.rotation_vector);
        out
    }

    pub fn from_array(values: &[f32; SNAPSHOT_LEN]) -> Self {
        let mut snapshot = SensorSnapshot::default();
        snapshot.magnetometer.copy_from_slice(&values[0..3]);
        snapshot.accelerometer.copy_from_slice(&values[3..6]);
        snapshot.gyroscope.copy_from_slice(&values[6..9]);
        snapshot.rotation_vector.copy_from_slice(&values[9..13]);
        snapshot
    }
}

/// Last-value-wins store for the four raw sensor channels.
///
/// Each channel has its own slot, so a producer for one channel never blocks
/// or tears another. A slot holds a whole vector; readers copy it under the
/// slot lock and therefore never see half of an update.
pub struct SensorSampleAggregator {
    slots: [Mutex<[f32; 4]>; 4],
    update_counts: [AtomicU64; 4],
}

impl SensorSampleAggregator {
    pub fn new() -> Self {
        SensorSampleAggregator {
            slots: Default::default(),
            update_counts: Default::default(),
        }
    }

    /// Overwrite `channel` with `values`.
    ///
    /// Extra trailing values (e.g. the rotation-vector accuracy element) are
    /// dropped; a short vector is zero-filled. Values are stored as given.
    pub fn update(&self, channel: SensorChannel, values: &[f32]) {
        let width = channel.width();
        if values.len() < width {
            log::debug!(
                "[sensors] {:?} event with {} values, expected {}",
                channel,
                values.len(),
                width
            );
        }

        let mut next = [0.0f32; 4];
        let n = values.len().min(width);
        next[..n].copy_from_slice(&values[..n]);

        let idx = channel.index();
        let mut slot = self.slots[idx]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = next;
        drop(slot);

        self.update_counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_magnetometer(&self, values: &[f32]) {
        self.update(SensorChannel::Magnetometer, values);
    }

    pub fn update_accelerometer(&self, values: &[f32]) {
        self.update(SensorChannel::Accelerometer, values);
    }

    pub fn update_gyroscope(&self, values: &[f32]) {
        self.update(SensorChannel::Gyroscope, values);
    }

    pub fn update_rotation_vector(&self, values: &[f32]) {
        self.update(SensorChannel::RotationVector, values);
    }

    fn read(&self, channel: SensorChannel) -> [f32; 4] {
        *self.slots[channel.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latest value per channel, zeros for channels never updated.
    pub fn snapshot(&self) -> SensorSnapshot {
        let mag = self.read(SensorChannel::Magnetometer);
        let accel = self.read(SensorChannel::Accelerometer);
        let gyro = self.read(SensorChannel::Gyroscope);
        let rot = self.read(SensorChannel::RotationVector);

        SensorSnapshot {
            magnetometer: [mag[0], mag[1], mag[2]],
            accelerometer: [accel[0], accel[1], accel[2]],
            gyroscope: [gyro[0], gyro[1], gyro[2]],
            rotation_vector: rot,
        }
    }

    /// Events received on `channel` since creation.
    pub fn update_count(&self, channel: SensorChannel) -> u64 {
        self.update_counts[channel.index()].load(Ordering::Relaxed)
    }
}

impl Default for SensorSampleAggregator {
    fn default() -> Self {
        Self::new()
    }
}
