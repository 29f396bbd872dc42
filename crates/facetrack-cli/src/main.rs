use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facetrack_core::{CameraFileProvider, CameraProvider};
use facetrack_hw::DeviceCamera;
use std::path::PathBuf;

// `#[zbus::proxy]` generates `TrackerProxy` (async) and `TrackerProxyBlocking`.
#[zbus::proxy(
    interface = "org.facetrack.Tracker1",
    default_service = "org.facetrack.Tracker1",
    default_path = "/org/facetrack/Tracker1"
)]
trait Tracker {
    async fn start(&self) -> zbus::Result<bool>;
    async fn stop(&self) -> zbus::Result<bool>;
    async fn reload(&self) -> zbus::Result<()>;
    async fn status(&self) -> zbus::Result<String>;
    async fn live_faces(&self) -> zbus::Result<String>;
    async fn list_events(&self, limit: u32) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facetrack", about = "facetrack attendance tracking CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking on all configured cameras
    Start,
    /// Stop tracking and release cameras
    Stop,
    /// Restart tracking with the current camera file
    Reload,
    /// Show daemon status
    Status,
    /// Drain and print faces detected since the last call
    Faces,
    /// List recent attendance events
    Events {
        /// Maximum number of events (capped at 500 by the daemon)
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// List local V4L2 capture devices
    Devices,
    /// Validate and print a camera file
    Cameras {
        /// Camera file (defaults to the daemon's)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => {
            let devices = DeviceCamera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
        Commands::Cameras { file } => {
            let path = file.unwrap_or_else(default_cameras_file);
            let cameras = CameraFileProvider::new(&path)
                .list_active()
                .with_context(|| format!("failed to load {}", path.display()))?;
            println!("{}: {} active camera(s)", path.display(), cameras.len());
            for camera in cameras {
                println!(
                    "  camera {}: {} {}x{} @ {} fps",
                    camera.camera_id,
                    camera.source,
                    camera.resolution.width,
                    camera.resolution.height,
                    camera.fps
                );
            }
        }
        Commands::Start => {
            if connect(cli.system).await?.start().await? {
                println!("Tracking started");
            } else {
                println!("Tracking not started (already running, or no camera could be opened)");
            }
        }
        Commands::Stop => {
            if connect(cli.system).await?.stop().await? {
                println!("Tracking stopped");
            } else {
                println!("Tracking was not running");
            }
        }
        Commands::Reload => {
            connect(cli.system).await?.reload().await?;
            println!("Cameras reloaded");
        }
        Commands::Status => print_json(&connect(cli.system).await?.status().await?)?,
        Commands::Faces => print_json(&connect(cli.system).await?.live_faces().await?)?,
        Commands::Events { limit } => {
            print_json(&connect(cli.system).await?.list_events(limit).await?)?
        }
    }

    Ok(())
}

async fn connect(system: bool) -> Result<TrackerProxy<'static>> {
    let conn = if system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("failed to connect to D-Bus")?;
    TrackerProxy::new(&conn)
        .await
        .context("facetrackd is not reachable")
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("daemon returned invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Same lookup as the daemon: `FACETRACK_CAMERAS_FILE`, else the XDG config dir.
fn default_cameras_file() -> PathBuf {
    if let Ok(path) = std::env::var("FACETRACK_CAMERAS_FILE") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"))
        .join("facetrack/cameras.toml")
}
