// WiFi + VIO + IMU recorder
// Time-aligns camera pose, raw inertial samples and WiFi scans into CSV sessions

pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod live_status;
pub mod pipeline;
pub mod projection;
pub mod records;
pub mod ring_buffer;
pub mod sensor_receiver;
pub mod session;
pub mod simulation;
pub mod storage;
pub mod wifi_gate;

pub use config::{RecorderConfig, SessionName, SsidFilter};
pub use error::{ErrorKind, RResult, RecorderError};
pub use events::{ChannelSink, EventSink, NullSink, PipelineEvent};
pub use frame::{ArFrame, CameraPose, ScreenPoint, ScreenSize};
pub use pipeline::{FrameOutcome, RecordingPipeline, StoppedRecording, WifiIngest, WifiScanner};
pub use ring_buffer::RingBuffer;
pub use session::{RecordingSession, SessionData, SessionMetadata, SessionState};
pub use storage::{CsvDirectoryStore, ExportJob, ExportReport, MemoryStore, RecordStore};
pub use wifi_gate::{AccessPoint, WifiResultGate};
