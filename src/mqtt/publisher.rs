use crate::config::Config;
use crate::errors::MqttError;
use crate::mqtt::context::PublishContext;
use crate::mqtt::metrics::{catalogue, Metric, COMMAND_TOPIC, MODE_TOPIC, ONLINE_TOPIC};
use crate::powervault::UnitInfo;
use crate::refresh::Snapshot;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

pub struct MqttPublisher {
    client: Client,
    root_topic: String,
    discovery_prefix: String,
    metrics: Vec<Metric>,
    commands: Receiver<String>,
}

macro_rules! publish_if_changed {
    ($context:expr, $topic:expr, $new:expr, $old:expr) => {
        if $old.as_ref() != Some(&$new) {
            $context.publish($topic, &$new)?;
        }
    };
}

impl MqttPublisher {
    pub fn new(config: &Config, unit_id: &str) -> Result<Self, MqttError> {
        let client_id = format!("powervault-mqtt-rs-{}", unit_id);

        let mut mqtt_options = if let Some(socket_path) = &config.mqtt.socket {
            // Unix domain socket connection
            tracing::info!("Using MQTT Unix socket: {}", socket_path);
            let mut options = MqttOptions::new(client_id, socket_path, 0);
            #[cfg(unix)]
            options.set_transport(rumqttc::Transport::Unix);
            options
        } else {
            // TCP connection
            let host = config.mqtt.host.as_ref().ok_or_else(|| {
                MqttError::ClientError("MQTT host or socket must be configured".to_string())
            })?;

            tracing::info!("Using MQTT TCP connection: {}:{}", host, config.mqtt.port);
            MqttOptions::new(client_id, host, config.mqtt.port)
        };

        if !config.mqtt.username.is_empty() {
            mqtt_options.set_credentials(&config.mqtt.username, &config.mqtt.password);
        }

        mqtt_options.set_keep_alive(Duration::from_secs(60));

        let root_topic = format!("{}/{}", config.mqtt.root, unit_id);

        // Last Will and Testament - publish "false" to online topic when connection is lost
        mqtt_options.set_last_will(rumqttc::LastWill {
            topic: format!("{}/{}", root_topic, ONLINE_TOPIC),
            message: b"false".to_vec().into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        });

        let (client, mut connection) = Client::new(mqtt_options, 10);
        let (sender, commands) = mpsc::channel();
        let command_topic = format!("{}/{}", root_topic, COMMAND_TOPIC);
        let subscriber = client.clone();

        // Event loop in a background thread; mode commands go to the main loop
        thread::spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("MQTT connected");
                        // Non-blocking: this thread is the one draining the request queue
                        if let Err(e) = subscriber.try_subscribe(&command_topic, QoS::AtLeastOnce)
                        {
                            tracing::error!("Failed to subscribe to {}: {:?}", command_topic, e);
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish)))
                        if publish.topic == command_topic =>
                    {
                        let option = String::from_utf8_lossy(&publish.payload).trim().to_string();
                        tracing::debug!("Received battery mode command: {}", option);
                        if sender.send(option).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // On connection error, crash the process (let it crash philosophy)
                        tracing::error!("MQTT connection error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            }
        });

        Ok(Self {
            client,
            root_topic,
            discovery_prefix: config.mqtt.discovery_prefix.clone(),
            metrics: catalogue(),
            commands,
        })
    }

    pub fn context(&'_ self, topic: &str) -> PublishContext<'_> {
        let full_topic = if topic.is_empty() {
            self.root_topic.clone()
        } else {
            format!("{}/{}", self.root_topic, topic)
        };
        PublishContext::new(&self.client, full_topic)
    }

    pub fn publish_online_status(&self, online: bool) -> Result<(), MqttError> {
        let context = self.context("");
        context.publish(ONLINE_TOPIC, &online)
    }

    /// Publish unit info as JSON
    pub fn publish_unit_info(&self, unit: &UnitInfo) -> Result<(), MqttError> {
        let context = self.context("");
        let json =
            serde_json::to_string(unit).map_err(|error| MqttError::SerializationError { error })?;
        context.publish("info", &json)
    }

    /// Publish Home Assistant discovery configs for every metric
    pub fn publish_discovery(&self, unit: &UnitInfo) -> Result<(), MqttError> {
        let context = PublishContext::new(&self.client, self.discovery_prefix.as_str());
        for metric in &self.metrics {
            let config = metric.discovery(unit, &self.root_topic);
            let json = serde_json::to_string(&config)
                .map_err(|error| MqttError::SerializationError { error })?;
            let topic = format!("{}/{}/config", metric.component(), config.unique_id);
            context.publish(&topic, &json)?;
        }
        tracing::debug!("Published {} discovery configs", self.metrics.len());
        Ok(())
    }

    /// Publish a snapshot
    /// Only publishes metrics whose payload changed compared to `old`
    pub fn publish_snapshot(
        &self,
        snapshot: &Snapshot,
        old: Option<&Snapshot>,
    ) -> Result<(), MqttError> {
        let context = self.context("");
        if let Some(time) = snapshot.time {
            let old_time = old.and_then(|o| o.time);
            publish_if_changed!(context, "status/time", time, old_time);
        }
        for metric in &self.metrics {
            let Some(payload) = metric.payload(snapshot) else {
                continue;
            };
            let old_payload = old.and_then(|o| metric.payload(o));
            publish_if_changed!(context, &metric.topic(), payload, old_payload);
        }
        Ok(())
    }

    /// Publish the battery mode on its own, ahead of the next refresh
    pub fn publish_mode(&self, mode: &str) -> Result<(), MqttError> {
        self.context("").publish(MODE_TOPIC, mode)
    }

    /// Wait up to `timeout` for a battery mode command
    pub fn next_command(&self, timeout: Duration) -> Result<Option<String>, MqttError> {
        match self.commands.recv_timeout(timeout) {
            Ok(option) => Ok(Some(option)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MqttError::ClientError(
                "MQTT event loop stopped".to_string(),
            )),
        }
    }
}
