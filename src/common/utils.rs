use rand::{rng, Rng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX_EPOCH. The registry stamps `active_ts` with this.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn jittered_delay(base: u64) -> u64 {
    let mut rng = rng();
    let jitter: f64 = rng.random_range(0.5..=1.5); // ±50% jitter
    (base as f64 * jitter) as u64
}
