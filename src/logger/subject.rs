//! Wire-level subject names for the two log channels.

/// JetStream subject holding every entry of a run: `logs.<run_id>`.
pub fn durable_subject(run_id: &str) -> String {
    format!("logs.{run_id}")
}

/// Core-NATS subject for live tailing one driver of a run: `live.logs.<run_id>.<driver>`.
pub fn live_subject(run_id: &str, driver: &str) -> String {
    format!("live.logs.{run_id}.{driver}")
}

/// Whether `token` can be embedded as a single NATS subject token.
pub fn is_subject_token(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>'))
}
