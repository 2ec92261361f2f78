use std::cmp::{max, min};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use powervault_mqtt_rs::config::Config;
use powervault_mqtt_rs::mqtt::MqttPublisher;
use powervault_mqtt_rs::powervault::{BatteryMode, Field, PowervaultApi, PowervaultClient};
use powervault_mqtt_rs::refresh::{refresh_with_retry, Snapshot};
use tracing::{debug, error, info, warn};

/// Powervault MQTT Bridge - Publishes Powervault battery data to MQTT
#[derive(Parser)]
#[command(name = "powervault-mqtt-rs")]
#[command(version)]
#[command(about = "Powervault MQTT Bridge - Publishes Powervault battery data to MQTT", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the units of the account owning the API key, then exit
    Units,
}

/// Round timestamp up to the next multiple of `interval`
/// Example: 12:00:07 with a 30s interval -> 12:00:30
fn next_interval(time: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let duration_since_last_interval = Duration::seconds(time.timestamp() % interval.num_seconds());
    time - duration_since_last_interval + interval
}

fn list_units(client: &PowervaultClient) -> anyhow::Result<()> {
    let account_id = client.get_account()?.id();
    let units = client.get_units(&account_id)?;
    info!("Found {} unit(s) for account {}", units.len(), account_id);
    for unit in &units {
        println!("{}\t{}\t{}", unit.id, unit.model, unit.eprom_id);
    }
    Ok(())
}

/// Applies a mode command and reflects it before the next refresh confirms it.
fn apply_mode_command(
    client: &impl PowervaultApi,
    publisher: &MqttPublisher,
    unit_id: &str,
    option: &str,
    last_snapshot: &mut Option<Snapshot>,
) -> anyhow::Result<()> {
    let mode: BatteryMode = match option.parse() {
        Ok(mode) => mode,
        Err(e) => {
            warn!("Ignoring battery mode command: {}", e);
            return Ok(());
        }
    };

    if let Err(e) = client.set_battery_mode(unit_id, mode) {
        error!("Failed to set battery mode to {}: {}", mode, e);
        return Ok(());
    }

    publisher.publish_mode(mode.as_str())?;
    *last_snapshot = last_snapshot.as_ref().map(|s| s.with_mode(mode.as_str()));
    info!("Battery mode set to {}", mode);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration first (to get log level)
    let config_path = cli.config;
    let config = Config::from_file(&config_path)?;

    // Initialize tracing with log level from config
    let app_log_level = config.default.log_level.as_str();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("powervault_mqtt_rs={}", app_log_level).parse()?)
                .add_directive("rumqttc=warn".parse()?)
                .add_directive("ureq=warn".parse()?),
        )
        .init();

    let interval = Duration::from_std(config.powervault.interval)?;

    info!("Configuration loaded from: {}", config_path);
    info!("Log level: {}", config.default.log_level);
    debug!("Debug logging is enabled");

    info!("  Powervault API: {}", config.powervault.base_url);
    info!("  Unit: {}", config.powervault.unit_id);
    info!("  MQTT Root: {}", config.mqtt.root);
    info!("  Interval: {:?}", interval);

    let client = PowervaultClient::new(
        &config.powervault.base_url,
        &config.powervault.api_key,
        config.powervault.timeout,
    );

    if let Some(Command::Units) = cli.command {
        return list_units(&client);
    }

    let unit_id = config.powervault.unit_id.as_str();
    let unit = client.get_unit(unit_id)?;
    info!(
        "Unit {}: model {}, firmware {}",
        unit.id, unit.model, unit.eprom_id
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    // Create MQTT publisher (blocking)
    info!("Creating MQTT publisher...");
    let mqtt_publisher = MqttPublisher::new(&config, unit_id)?;

    // Give MQTT a moment to connect
    std::thread::sleep(Duration::milliseconds(500).to_std()?);

    mqtt_publisher.publish_online_status(true)?;
    mqtt_publisher.publish_unit_info(&unit)?;
    mqtt_publisher.publish_discovery(&unit)?;
    info!("✓ Published unit info and discovery");

    let mut next_loop = Utc::now();
    let mut last_snapshot: Option<Snapshot> = None;
    info!("Starting main loop...");

    while running.load(Ordering::SeqCst) {
        let now = Utc::now();
        if now >= next_loop {
            next_loop = next_interval(now, interval);

            match refresh_with_retry(&client, unit_id, config.powervault.retries) {
                Ok(snapshot) => {
                    if let Err(e) =
                        mqtt_publisher.publish_snapshot(&snapshot, last_snapshot.as_ref())
                    {
                        error!("Failed to publish snapshot: {:?}", e);
                        // Let it crash on MQTT errors
                        return Err(e.into());
                    }
                    debug!(
                        "Snapshot: SOC={:.0}% Battery={:.0}W Grid={:.0}W Solar={:.0}W Mode={}",
                        snapshot.charge(),
                        snapshot.get(Field::InstantBattery).unwrap_or_default(),
                        snapshot.get(Field::InstantGrid).unwrap_or_default(),
                        snapshot.get(Field::InstantSolar).unwrap_or_default(),
                        snapshot.mode
                    );
                    last_snapshot = Some(snapshot);
                }
                Err(e) => warn!("Refresh failed, keeping last snapshot: {}", e),
            }
        }

        // Wait for the next tick, serving mode commands meanwhile.
        // Capped so that Ctrl-C is noticed within a second.
        let wait = min(
            max(next_loop - Utc::now(), Duration::milliseconds(100)),
            Duration::seconds(1),
        );
        if let Some(option) = mqtt_publisher.next_command(wait.to_std()?)? {
            apply_mode_command(
                &client,
                &mqtt_publisher,
                unit_id,
                &option,
                &mut last_snapshot,
            )?;
        }
    }

    info!("Shutting down...");
    mqtt_publisher.publish_online_status(false)?;
    // Give the event loop a moment to flush
    std::thread::sleep(Duration::milliseconds(500).to_std()?);
    Ok(())
}
