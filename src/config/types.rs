use crate::crawler::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::robots::DEFAULT_ROBOTS_TTL_HOURS;
use serde::Deserialize;

/// Main configuration structure for Trawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub client: ClientConfig,
    pub politeness: PolitenessConfig,
}

/// Defaults applied to requests whose rule set leaves them unset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// User-Agent sent when a rule set has none
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds when a rule set has none
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Politeness gates installed on the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolitenessConfig {
    /// Install the robots.txt gate
    #[serde(rename = "respect-robots-txt")]
    pub respect_robots_txt: bool,

    /// Lifetime of a cached robots.txt policy
    #[serde(rename = "robots-ttl-hours")]
    pub robots_ttl_hours: u64,

    /// Install the per-host pacing gate
    pub pacing: bool,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            respect_robots_txt: true,
            robots_ttl_hours: DEFAULT_ROBOTS_TTL_HOURS as u64,
            pacing: true,
        }
    }
}
