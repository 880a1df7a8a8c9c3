use csv::QuoteStyle;
use serde::{Deserialize, Serialize};
use std::io;

/// One camera pose per recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub timestamp: i64,
    pub position: [f32; 3],
    /// (x, y, z, w)
    pub orientation: [f32; 4],
    pub tracking_state: String,
}

/// Raw inertial snapshot taken on the same frame as the pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuRecord {
    pub timestamp: i64,
    pub magnetometer: [f32; 3],
    pub accelerometer: [f32; 3],
    pub gyroscope: [f32; 3],
    pub rotation_vector: [f32; 4],
}

/// One access point from the gated scan, stamped with the frame time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiRecord {
    pub timestamp: i64,
    pub successful_timestamp: i64,
    pub rssi: i32,
    pub ssid: String,
    pub bssid: String,
    pub frequency_mhz: i32,
    pub last_seen: i64,
}

/// Which of the three time series a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Vio,
    RawImu,
    Wifi,
}

impl RecordKind {
    /// Stem used in export file names.
    pub fn file_stem(&self) -> &'static str {
        match self {
            RecordKind::Vio => "vio",
            RecordKind::RawImu => "rawIMU",
            RecordKind::Wifi => "wifi",
        }
    }

    /// Column names, as declared by the row type.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Vio => PoseRecord::HEADER,
            RecordKind::RawImu => ImuRecord::HEADER,
            RecordKind::Wifi => WifiRecord::HEADER,
        }
    }
}

/// Row-oriented view of a record for CSV export.
pub trait CsvRecord {
    const KIND: RecordKind;
    const HEADER: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

/// CSV writer with every field quoted and inner quotes doubled.
pub fn quoted_writer<W: io::Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(inner)
}

/// Header row followed by one row per record.
pub fn write_rows<R: CsvRecord, W: io::Write>(out: &mut csv::Writer<W>, rows: &[R]) -> csv::Result<()> {
    out.write_record(R::HEADER)?;
    for row in rows {
        out.write_record(row.fields())?;
    }
    out.flush()?;
    Ok(())
}

impl CsvRecord for PoseRecord {
    const KIND: RecordKind = RecordKind::Vio;
    const HEADER: &'static [&'static str] = &[
        "timestamp",
        "positionX",
        "positionY",
        "positionZ",
        "quaternionX",
        "quaternionY",
        "quaternionZ",
        "quaternionW",
        "state",
    ];

    fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(Self::HEADER.len());
        fields.push(self.timestamp.to_string());
        fields.extend(self.position.iter().map(|v| v.to_string()));
        fields.extend(self.orientation.iter().map(|v| v.to_string()));
        fields.push(self.tracking_state.clone());
        fields
    }
}

impl CsvRecord for ImuRecord {
    const KIND: RecordKind = RecordKind::RawImu;
    const HEADER: &'static [&'static str] = &[
        "timestamp",
        "magnetometerX",
        "magnetometerY",
        "magnetometerZ",
        "accelerometerX",
        "accelerometerY",
        "accelerometerZ",
        "gyroscopeX",
        "gyroscopeY",
        "gyroscopeZ",
        "rotationVectorX",
        "rotationVectorY",
        "rotationVectorZ",
        "rotationVectorW",
    ];

    fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(Self::HEADER.len());
        fields.push(self.timestamp.to_string());
        fields.extend(
            self.magnetometer
                .iter()
                .chain(self.accelerometer.iter())
                .chain(self.gyroscope.iter())
                .chain(self.rotation_vector.iter())
                .map(|v| v.to_string()),
        );
        fields
    }
}

impl CsvRecord for WifiRecord {
    const KIND: RecordKind = RecordKind::Wifi;
    const HEADER: &'static [&'static str] = &[
        "timestamp",
        "successfulTimestamp",
        "rssi",
        "ssid",
        "bssid",
        "frequency",
        "lastSeen",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.timestamp.to_string(),
            self.successful_timestamp.to_string(),
            self.rssi.to_string(),
            self.ssid.clone(),
            self.bssid.clone(),
            self.frequency_mhz.to_string(),
            self.last_seen.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_csv<R: CsvRecord>(rows: &[R]) -> String {
        let mut buf = Vec::new();
        {
            let mut out = quoted_writer(&mut buf);
            write_rows(&mut out, rows).unwrap();
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_pose_row() {
        let pose = PoseRecord {
            timestamp: 1700000000123,
            position: [1.0, -0.5, 2.25],
            orientation: [0.0, 0.0, 0.0, 1.0],
            tracking_state: "TRACKING".to_string(),
        };
        assert_eq!(pose.fields().len(), PoseRecord::HEADER.len());
        let text = to_csv(&[pose]);
        assert_eq!(
            text.lines().nth(1),
            Some("\"1700000000123\",\"1\",\"-0.5\",\"2.25\",\"0\",\"0\",\"0\",\"1\",\"TRACKING\"")
        );
    }

    #[test]
    fn test_imu_row_channel_order() {
        let imu = ImuRecord {
            timestamp: 5,
            magnetometer: [1.0, 2.0, 3.0],
            accelerometer: [4.0, 5.0, 6.0],
            gyroscope: [7.0, 8.0, 9.0],
            rotation_vector: [10.0, 11.0, 12.0, 13.0],
        };
        let fields = imu.fields();
        assert_eq!(fields.len(), 14);
        assert_eq!(fields[1], "1");
        assert_eq!(fields[4], "4");
        assert_eq!(fields[7], "7");
        assert_eq!(fields[13], "13");
    }

    #[test]
    fn test_wifi_row_keeps_last_seen_and_escapes() {
        let wifi = WifiRecord {
            timestamp: 10,
            successful_timestamp: 8,
            rssi: -61,
            ssid: "TA \"lab\", 2F".to_string(),
            bssid: "aa:bb:cc:dd:ee:ff".to_string(),
            frequency_mhz: 5180,
            last_seen: 123456789,
        };
        let text = to_csv(&[wifi]);
        let line = text.lines().nth(1).unwrap();
        assert!(line.contains("\"TA \"\"lab\"\", 2F\""));
        assert!(line.ends_with("\"123456789\""));
        assert_eq!(WifiRecord::HEADER.len(), 7);
    }

    #[test]
    fn test_nan_is_stored_verbatim() {
        let imu = ImuRecord {
            timestamp: 0,
            magnetometer: [f32::NAN, 0.0, 0.0],
            accelerometer: [0.0; 3],
            gyroscope: [0.0; 3],
            rotation_vector: [0.0; 4],
        };
        assert_eq!(imu.fields()[1], "NaN");
    }

    #[test]
    fn test_header_and_stems() {
        assert_eq!(RecordKind::RawImu.file_stem(), "rawIMU");
        assert_eq!(RecordKind::Wifi.header(), WifiRecord::HEADER);
        assert_eq!(PoseRecord::KIND.header(), PoseRecord::HEADER);
        assert_eq!(ImuRecord::KIND, RecordKind::RawImu);

        let empty: [WifiRecord; 0] = [];
        let text = to_csv(&empty);
        assert!(text.starts_with("\"timestamp\",\"successfulTimestamp\""));
        assert_eq!(text.lines().count(), 1);
    }
}
