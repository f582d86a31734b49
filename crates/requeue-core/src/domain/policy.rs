//! Default retry policies: delay escalation and attempt counting.
//!
//! Both are the defaults behind the `on_delay` / `on_attempts` hooks and can be
//! replaced per queue. They only touch the envelope they are given.

use std::time::Duration;

use super::envelope::TaskEnvelope;
use super::settings::QueueSettings;

/// Escalate the envelope's delay by one backoff step.
///
/// `delay = min((delay or default_delay) * delay_multiplier, delay_threshold)`
///
/// The first failure already multiplies once, so with `default_delay=1s` and
/// `delay_multiplier=2.0`:
/// - failure 1: 2s
/// - failure 2: 4s
/// - failure 3: 8s
///
/// A delay supplied at `put` is treated the same way (multiplied, not reused).
pub fn escalate_delay(settings: &QueueSettings, envelope: &mut TaskEnvelope) {
    let current = envelope.delay.unwrap_or(settings.default_delay);
    let ceiling = settings.delay_threshold;
    let secs = (current.as_secs_f64() * settings.delay_multiplier).min(ceiling.as_secs_f64());
    let next = Duration::try_from_secs_f64(secs).unwrap_or(ceiling);
    envelope.delay = Some(next.min(ceiling));
}

/// Count one more failure.
pub fn bump_attempts(envelope: &mut TaskEnvelope) {
    envelope.attempts = envelope.attempts.saturating_add(1);
}
