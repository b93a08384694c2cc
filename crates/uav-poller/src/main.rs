//! UAV Telemetry Poller CLI
//!
//! Connects to a running simulation engine, polls vehicle state each
//! tick, evaluates detection geometry against the configured sensing
//! device, and prints detection events as JSON lines.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uav_bridge::{
    BridgeConfig, ConnectionManager, SensorKind, SensorRegistration, StateStore,
    TelemetryTranslator,
};
use uav_domain::{DeviceDescriptor, Position};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "uav-poller")]
#[command(about = "Poll simulated vehicle telemetry and emit detection events")]
struct Args {
    /// Engine host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Engine RPC port
    #[arg(long, default_value = "41451")]
    port: u16,

    /// Vehicle names, comma-separated
    #[arg(short, long, default_value = "Drone1")]
    vehicles: String,

    /// Sensors to poll per vehicle, comma-separated kind:name pairs
    /// (kinds: imu, distance, lidar)
    #[arg(short, long, default_value = "imu:Imu0")]
    sensors: String,

    /// Poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Number of polling ticks
    #[arg(long, default_value = "60")]
    ticks: u32,

    /// Device position as north,east,down meters
    #[arg(long, default_value = "0,0,0")]
    device_position: String,

    /// Device boresight heading, degrees clockwise from north
    #[arg(long, default_value = "0")]
    device_heading: f64,

    /// Device sensitivity threshold, dBm
    #[arg(long, default_value = "-70")]
    sensitivity: f64,

    /// Device maximum range, meters
    #[arg(long, default_value = "5000")]
    max_range: f64,

    /// Device field of view, degrees (360 for omnidirectional)
    #[arg(long, default_value = "360")]
    fov: f64,

    /// Assumed target radar cross-section, square meters
    #[arg(long, default_value = "0.1")]
    rcs: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("uav_poller=info".parse()?))
        .init();

    let args = Args::parse();

    let vehicles: Vec<String> = args
        .vehicles
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if vehicles.is_empty() {
        bail!("no vehicles given");
    }

    let sensors = parse_sensors(&args.sensors)?;
    let device = build_device(&args)?;

    let config = BridgeConfig {
        host: args.host.clone(),
        port: args.port,
        ..Default::default()
    };

    info!(
        "Connecting to engine at {}:{} ({} vehicles, {} sensors each)",
        args.host,
        args.port,
        vehicles.len(),
        sensors.len()
    );

    let manager = Arc::new(ConnectionManager::new(config)?);
    manager.connect().await?;
    manager.confirm_connection().await?;

    let store = Arc::new(StateStore::new());
    let translator = TelemetryTranslator::new(Arc::clone(&manager), Arc::clone(&store), sensors);

    info!("Device: {} @ {:?}", device.name, device.position);
    info!("Tick: {}ms, Duration: {} ticks", args.tick_ms, args.ticks);

    for tick in 0..args.ticks {
        for vehicle_id in &vehicles {
            let state = match translator.poll_vehicle_state(vehicle_id).await {
                Ok(state) => state,
                Err(err) => {
                    warn!("Poll failed for {vehicle_id}: {err}");
                    continue;
                }
            };

            let event = uav_detection::evaluate(
                &device,
                vehicle_id,
                &state.kinematics,
                args.rcs,
                state.captured_at,
            );
            info!(
                "Tick {}/{} | {} | range {:.1}m az {:.1} el {:.1} | {}",
                tick + 1,
                args.ticks,
                vehicle_id,
                event.range_m,
                event.azimuth_deg,
                event.elevation_deg,
                if event.detected { "DETECTED" } else { "clear" }
            );
            println!("{}", serde_json::to_string(&event)?);
        }

        // Health probe between ticks; the manager handles degradation.
        if tick % 10 == 9 && !manager.ping().await.unwrap_or(false) {
            warn!("Health probe failed, state: {:?}", manager.state());
        }

        sleep(Duration::from_millis(args.tick_ms)).await;
    }

    info!("Polling complete, {} cached states", store.len().await);
    store.clear().await;
    manager.close().await;

    Ok(())
}

/// Parse comma-separated `kind:name` sensor pairs.
fn parse_sensors(spec: &str) -> Result<Vec<SensorRegistration>> {
    let mut sensors = Vec::new();
    for pair in spec.split(',').filter(|p| !p.trim().is_empty()) {
        let (kind, name) = pair
            .trim()
            .split_once(':')
            .with_context(|| format!("sensor '{pair}' is not kind:name"))?;
        let kind = match kind.trim().to_ascii_lowercase().as_str() {
            "imu" => SensorKind::Imu,
            "distance" => SensorKind::Distance,
            "lidar" => SensorKind::Lidar,
            other => bail!("unknown sensor kind '{other}'"),
        };
        sensors.push(SensorRegistration {
            name: name.trim().to_string(),
            kind,
        });
    }
    Ok(sensors)
}

fn build_device(args: &Args) -> Result<DeviceDescriptor> {
    let coords: Vec<f64> = args
        .device_position
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .context("device position must be numeric north,east,down")?;
    if coords.len() != 3 {
        bail!("device position must have exactly three components");
    }

    Ok(DeviceDescriptor {
        device_id: Uuid::new_v4(),
        name: "ground-station".to_string(),
        position: Position::new(coords[0], coords[1], coords[2]),
        heading_deg: args.device_heading,
        sensitivity_dbm: args.sensitivity,
        min_frequency_hz: 2.4e9,
        max_frequency_hz: 5.8e9,
        scan_bandwidth_hz: 20.0e6,
        max_range_m: args.max_range,
        field_of_view_deg: args.fov,
        velocity: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensors() {
        let sensors = parse_sensors("imu:Imu0, lidar:LidarFront").unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].kind, SensorKind::Imu);
        assert_eq!(sensors[0].name, "Imu0");
        assert_eq!(sensors[1].kind, SensorKind::Lidar);
    }

    #[test]
    fn test_parse_sensors_rejects_unknown_kind() {
        assert!(parse_sensors("sonar:S0").is_err());
    }

    #[test]
    fn test_parse_sensors_rejects_missing_name() {
        assert!(parse_sensors("imu").is_err());
    }
}
