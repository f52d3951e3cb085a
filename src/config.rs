use std::env;
use std::time::Duration;

/// Tunables for one orchestration session.
///
/// Everything has a sensible default; `from_env` only overrides what is set.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Branch used when a caller does not supply a ref.
    pub default_branch: String,
    /// Fixed tick between status polls for an in-flight remote task.
    pub poll_interval: Duration,
    /// Hard deadline for a single remote execution; past it the agent fails.
    pub poll_timeout: Duration,
    /// Delay before an agent picks up its next assigned pending task.
    pub continuation_delay: Duration,
    /// Chance per completion that two working agents exchange a message.
    pub collaboration_probability: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(300),
            continuation_delay: Duration::from_secs(4),
            collaboration_probability: 0.08,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_branch: env::var("FLEET_DEFAULT_BRANCH")
                .unwrap_or(defaults.default_branch),
            poll_interval: env_secs("FLEET_POLL_INTERVAL_SECS")
                .unwrap_or(defaults.poll_interval),
            poll_timeout: env_secs("FLEET_POLL_TIMEOUT_SECS")
                .unwrap_or(defaults.poll_timeout),
            continuation_delay: env_secs("FLEET_CONTINUATION_DELAY_SECS")
                .unwrap_or(defaults.continuation_delay),
            collaboration_probability: env::var("FLEET_COLLAB_PROBABILITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.collaboration_probability),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key).ok()?.parse().ok().map(Duration::from_secs)
}
