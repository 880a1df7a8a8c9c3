use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant};

use wifi_vio_recorder::events::EventSink;
use wifi_vio_recorder::live_status::LiveStatusSink;
use wifi_vio_recorder::sensor_receiver::{SensorChannel, SensorSampleAggregator};
use wifi_vio_recorder::simulation::{mock_scan, mock_sensor_event, MockWifiScanner, SyntheticCamera};
use wifi_vio_recorder::{
    CsvDirectoryStore, RecordStore, RecorderConfig, RecordingPipeline, ScreenSize, WifiIngest,
};

#[derive(Parser, Debug)]
#[command(name = "wifi_vio_recorder")]
#[command(about = "Record time-aligned VIO pose, raw IMU and WiFi scans to CSV", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(long, value_name = "SECONDS", default_value = "30")]
    duration: u64,

    /// Session name (spaces are removed)
    #[arg(long, default_value = "session")]
    name: String,

    /// Output directory
    #[arg(long, default_value = "recordings")]
    output_dir: String,

    /// SSID regex; overrides the config file
    #[arg(long)]
    ssid_pattern: Option<String>,

    /// Ring buffer capacity per record kind; overrides the config file
    #[arg(long)]
    capacity: Option<usize>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Seconds between completed WiFi scans
    #[arg(long, default_value = "4")]
    scan_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RecorderConfig::load(path)?,
        None => RecorderConfig::default(),
    };
    if let Some(pattern) = &args.ssid_pattern {
        config.ssid_pattern = pattern.clone();
    }
    if let Some(capacity) = args.capacity {
        config.buffer_capacity = capacity;
    }
    if args.fps == 0 {
        anyhow::bail!("--fps must be greater than zero");
    }

    println!("[{}] WiFi/VIO Recorder Starting", ts_now());
    println!("  Session: {}", args.name);
    println!("  Duration: {} seconds (0=until Ctrl-C)", args.duration);
    println!("  SSID pattern: {}", config.ssid_pattern);
    println!("  Buffer capacity: {}", config.buffer_capacity);
    println!("  Frame rate: {} fps", args.fps);
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    let status = Arc::new(LiveStatusSink::new());
    let events: Arc<dyn EventSink> = status.clone();
    let scanner = MockWifiScanner::new();
    let store: Arc<dyn RecordStore> = Arc::new(CsvDirectoryStore::new(&args.output_dir));
    let mut pipeline = RecordingPipeline::new(&config, events, Box::new(scanner.clone()), store)?;

    let start = Instant::now();
    let sensors = pipeline.sensors();
    let mut tasks = Vec::new();
    for channel in SensorChannel::ALL {
        tasks.push(tokio::spawn(sensor_loop(channel, Arc::clone(&sensors), start)));
    }
    tasks.push(tokio::spawn(scan_loop(
        scanner.clone(),
        pipeline.wifi_ingest(),
        Duration::from_secs(args.scan_interval.max(1)),
    )));

    let screen = ScreenSize::new(1080, 1920);
    let camera = SyntheticCamera::new(screen);
    pipeline.start_recording(&args.name)?;
    println!("[{}] Recording started", ts_now());

    let status_path = format!("{}/live_status.json", args.output_dir);
    let status_every = Duration::from_secs(config.live_status_interval_secs.max(1));
    let mut last_status = Instant::now();
    let mut frames = interval(Duration::from_secs_f64(1.0 / args.fps as f64));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = frames.tick() => {}
            _ = &mut ctrl_c => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
        }

        let elapsed = start.elapsed();
        if args.duration > 0 && elapsed.as_secs() >= args.duration {
            println!("[{}] Duration reached, stopping...", ts_now());
            break;
        }

        let frame = camera.frame(elapsed.as_secs_f64(), elapsed.as_nanos() as i64);
        let outcome = pipeline.process_frame(&frame, screen, Utc::now().timestamp_millis());
        if let Some(err) = outcome.stopped_by {
            eprintln!("[{}] Recording stopped: {}", ts_now(), err);
            break;
        }

        if last_status.elapsed() >= status_every {
            let _ = status.status().save(&status_path);
            last_status = Instant::now();
        }
    }

    for task in &tasks {
        task.abort();
    }

    // A forced stop keeps its buffers; export them explicitly.
    let job = if pipeline.is_recording() {
        pipeline.stop_recording()?.export?
    } else {
        pipeline.export_last_session()?
    };
    let report = tokio::task::spawn_blocking(move || job.wait()).await??;

    let final_status = status.status();
    let _ = final_status.save(&format!("{}/live_status_final.json", args.output_dir));

    let session = pipeline.session();
    println!("\n=== Final Stats ===");
    println!("Elapsed: {}", final_status.elapsed_display);
    println!("Frames recorded: {}", session.pose_counter());
    println!("WiFi rows recorded: {}", session.wifi_counter());
    println!("Scan requests: {}", scanner.requests());
    println!(
        "Rows exported: {} pose, {} imu, {} wifi",
        report.pose_rows, report.imu_rows, report.wifi_rows
    );
    for file in &report.files {
        println!("  {}", file);
    }

    Ok(())
}

async fn sensor_loop(channel: SensorChannel, sensors: Arc<SensorSampleAggregator>, start: Instant) {
    let mut interval = interval(Duration::from_millis(20)); // ~50Hz sampling

    loop {
        interval.tick().await;
        let t = start.elapsed().as_secs_f64();
        sensors.update(channel, &mock_sensor_event(channel, t));
    }
}

async fn scan_loop(scanner: MockWifiScanner, ingest: WifiIngest, period: Duration) {
    let mut interval = interval(period);
    let mut answered = 0u64;
    let mut seq = 0u64;

    loop {
        interval.tick().await;

        // Only requested scans complete.
        let requested = scanner.requests();
        if requested == answered {
            continue;
        }
        answered = requested;
        seq += 1;

        let now = Utc::now().timestamp_millis();
        match ingest.submit(mock_scan(seq, now), now) {
            Some(count) => log::debug!("[wifi] scan {} accepted: {} APs", seq, count),
            None => log::debug!("[wifi] scan {} rejected as stale", seq),
        }
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
