//! ARMH7 Link command-line entry point.
//!
//! ```text
//! armh7link [config.json] [scan|angles|imu|sensors|buzzer|flash|free|hold]
//! ```
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  LinkConfig (JSON) ──▶ open_device          │
//! │     ELF symbols · SerialTransport · Link    │
//! │                     │                       │
//! │                     ▼                       │
//! │  Armh7Device ──▶ subcommand ──▶ log output  │
//! └─────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result, bail};
use log::{LevelFilter, info};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use armh7link::adapters::serial::{SerialTransport, available_ports, open_device};
use armh7link::{Armh7Device, LinkConfig};

const COMMANDS: &[&str] = &["scan", "angles", "imu", "sensors", "buzzer", "flash", "free", "hold"];

fn main() -> Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new().set_time_format_rfc3339().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("logger init")?;

    info!("ARMH7 Link v{}", env!("CARGO_PKG_VERSION"));

    let mut config_path = None;
    let mut command = None;
    for arg in std::env::args().skip(1) {
        if COMMANDS.contains(&arg.as_str()) {
            command = Some(arg);
        } else if config_path.is_none() {
            config_path = Some(arg);
        } else {
            bail!("unexpected argument `{arg}` (commands: {})", COMMANDS.join(", "));
        }
    }

    let config = match &config_path {
        Some(path) => LinkConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => LinkConfig::default(),
    };

    let device = open_device(&config).with_context(|| {
        format!(
            "opening board on {} (ports present: {:?})",
            config.port,
            available_ports()
        )
    })?;

    run(&device, command.as_deref().unwrap_or("scan"))
}

fn run(device: &Armh7Device<SerialTransport>, command: &str) -> Result<()> {
    match command {
        "scan" => {
            let found = device.rescan().context("discovery scan")?;
            info!("servos:  {:?}", found.servo_ids.unwrap_or_default());
            info!("wheels:  {:?}", found.wheel_ids.unwrap_or_default());
            info!("worms:   {:?}", found.worm_ids.unwrap_or_default());
            info!("sensors: {:?}", found.sensor_ids.unwrap_or_default());
        }
        "angles" => {
            let ids = device.servo_sorted_ids()?;
            let current = device.angle_vector()?;
            let reference = device.reference_angle_vector()?;
            for id in ids {
                if let (Some(c), Some(r)) = (current.get(id), reference.get(id)) {
                    info!("servo {id:2}: current {c:5} ref {r:5}");
                }
            }
        }
        "imu" => {
            let o = device.read_orientation()?;
            info!("quaternion {:?}", o.quaternion);
            info!("rpy        {:?}", o.rpy());
            info!("|gyro|     {:.4}", o.gyro_norm());
        }
        "sensors" => {
            for s in device.all_jointbase_sensors()? {
                info!(
                    "sensor {}: port {} magenc {} ps {:?} {:.1} C",
                    s.id, s.port, s.magenc, s.proximity, s.temperature
                );
            }
        }
        "buzzer" => {
            device.buzzer()?;
        }
        "flash" => {
            device.write_to_flash().context("writing parameters to flash")?;
            info!("Parameters written to flash");
        }
        "free" => {
            device.free(None)?;
        }
        "hold" => {
            device.hold(None)?;
        }
        other => bail!("unknown command `{other}`"),
    }
    Ok(())
}
