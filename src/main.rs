mod config;
mod error;
mod mqtt;
mod relay;
mod sensor;
mod topic;

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting shelly-to-mqtt bridge (http={}, mqtt={}:{}, prefix={:?}, rooms={})",
        config.http.listen_addr,
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.mqtt.topic_prefix,
        config.routes.len(),
    );

    // The first broker connection must succeed; later drops are retried by the event loop.
    let mut mqtt_client = mqtt::client::MqttClient::new(&config.mqtt);
    if let Err(e) = mqtt_client.connect().await {
        error!("{}", e);
        if e.is_fatal() {
            std::process::exit(1);
        }
    }
    debug!("MQTT state after startup: {}", mqtt_client.state());
    let publisher = mqtt_client.handle();

    let (mqtt_cmd_tx, mut mqtt_cmd_rx) = mpsc::channel::<mqtt::MqttMessage>(100);
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(mqtt_cmd_tx).await;
    });

    let device_client = match relay::client::HttpDeviceClient::new(config.http.device_timeout) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to build device HTTP client: {}", e);
            std::process::exit(1);
        }
    };
    let routes = Arc::new(config.routes.clone());
    let topic_prefix: Arc<str> = Arc::from(config.mqtt.topic_prefix.as_str());

    let listener = match tokio::net::TcpListener::bind(config.http.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to listen on {}: {}", config.http.listen_addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening for sensor webhooks on {}", config.http.listen_addr);

    let app = sensor::server::build(sensor::server::AppState::new(
        publisher,
        &config.mqtt.topic_prefix,
    ));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            error!("HTTP server error: {}", e);
        }
    });

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            std::process::exit(1);
        }
    };

    // Main loop: hand relay commands to their own tasks + handle shutdown
    loop {
        tokio::select! {
            Some(msg) = mqtt_cmd_rx.recv() => {
                let device_client = Arc::clone(&device_client);
                let routes = Arc::clone(&routes);
                let topic_prefix = Arc::clone(&topic_prefix);
                tokio::spawn(async move {
                    match relay::client::dispatch(device_client.as_ref(), &routes, &topic_prefix, &msg).await {
                        Ok(url) => debug!("Relay request to {} succeeded", url),
                        Err(e @ (BridgeError::MalformedAddress { .. } | BridgeError::UnroutableRoom { .. })) => {
                            warn!("Dropping relay command: {}", e);
                        }
                        Err(e) => warn!("Relay command failed: {}", e),
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = http_handle.await {
        warn!("HTTP server task ended abnormally: {}", e);
    }
    mqtt_handle.abort();
    info!("shelly-to-mqtt bridge stopped");
}
