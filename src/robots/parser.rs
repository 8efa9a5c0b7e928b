//! Robots.txt policy
//!
//! Matching is done by the robotstxt crate; this type only remembers what the
//! fetch of the policy document produced.

use robotstxt::DefaultMatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Policy {
    AllowAll,
    DisallowAll,
    Rules(String),
}

/// Parsed robots.txt data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRobots {
    policy: Policy,
}

impl ParsedRobots {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            policy: Policy::Rules(content.to_string()),
        }
    }

    pub fn allow_all() -> Self {
        Self {
            policy: Policy::AllowAll,
        }
    }

    pub fn disallow_all() -> Self {
        Self {
            policy: Policy::DisallowAll,
        }
    }

    /// Creates a policy from the outcome of fetching `/robots.txt`
    ///
    /// A missing document (4xx) allows everything; a server error disallows
    /// everything until the entry expires.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        match status {
            200..=299 => Self::from_content(&String::from_utf8_lossy(body)),
            400..=499 => Self::allow_all(),
            _ => Self::disallow_all(),
        }
    }

    /// Checks if `url` may be fetched by `user_agent`
    ///
    /// `url` is either an absolute URL or a path. Only the product token of
    /// the User-Agent (the part before `/`) is matched against the groups.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.policy {
            Policy::AllowAll => true,
            Policy::DisallowAll => false,
            Policy::Rules(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, product_token(user_agent), url)
            }
        }
    }
}

fn product_token(user_agent: &str) -> &str {
    user_agent
        .split('/')
        .next()
        .unwrap_or(user_agent)
        .trim()
}
