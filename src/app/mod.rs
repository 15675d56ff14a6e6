pub mod tracing;

use crate::adapter::NatsConnection;
use crate::config::Config;
use crate::logger::DriverLogger;
use crate::port::LogConnection;

/// Application entry point. Initializes tracing, connects to NATS and emits.
///
/// A connection failure is not fatal: the logger runs without channels and the
/// process still exits successfully.
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::init_tracing(config.log_level.into());
    config.validate()?;

    let run_id = config
        .run_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let connection = match NatsConnection::connect(&config.nats_settings()).await {
        Ok(connection) => Some(connection),
        Err(e) => {
            ::tracing::warn!(error = %e, "NATS unavailable, log entries will not be published");
            None
        }
    };

    let logger = DriverLogger::new(
        run_id,
        config.driver_name.clone(),
        connection.as_ref().map(|c| c as &dyn LogConnection),
    )
    .with_default_labels(config.labels());
    ::tracing::info!(
        run_id = logger.run_id(),
        durable_subject = logger.durable_subject(),
        live_subject = logger.live_subject(),
        "Driver logger ready"
    );

    let pipeline = config.pipeline.as_deref();
    if config.stdin {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let forwarded = logger
            .forward_lines(stdin, pipeline, &crate::domain::Labels::new())
            .await?;
        ::tracing::info!(lines = forwarded, "Forwarded stdin");
    }
    if let Some(message) = &config.message {
        logger.emit(message.as_str(), pipeline, crate::domain::Labels::new()).await;
    }

    if let Some(connection) = &connection
        && let Err(e) = connection.flush().await
    {
        ::tracing::warn!(error = %e, "Failed to flush NATS connection");
    }

    Ok(())
}
