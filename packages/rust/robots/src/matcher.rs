//! robots.txt directive evaluation.
//!
//! Rule parsing and precedence are delegated to `texting_robots`. This module
//! only decides which of several user-agent tokens speaks for the crawler.

use texting_robots::Robot;
use tracing::trace;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The matcher rejected its robots.txt input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MatchError {
    /// Reason reported by the underlying parser.
    pub message: String,
}

/// Answers whether a URL may be fetched under a robots.txt policy.
///
/// Implementations must be pure: the same inputs always give the same answer.
pub trait RobotsMatcher: Send + Sync {
    /// Evaluate `url` for a crawler identified by `user_agents` (most specific first).
    fn is_allowed(
        &self,
        robots_txt: &str,
        user_agents: &[String],
        url: &str,
    ) -> Result<bool, MatchError>;

    /// Human-readable matcher name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// texting_robots adapter
// ---------------------------------------------------------------------------

/// [`RobotsMatcher`] backed by the `texting_robots` parser.
///
/// The first token with its own `User-agent` group governs. When no token has
/// one, the first token is evaluated and the parser falls back to `*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextingRobotsMatcher;

impl RobotsMatcher for TextingRobotsMatcher {
    fn is_allowed(
        &self,
        robots_txt: &str,
        user_agents: &[String],
        url: &str,
    ) -> Result<bool, MatchError> {
        let Some(first) = user_agents.first() else {
            return Err(MatchError {
                message: "no user-agent tokens given".into(),
            });
        };
        let agent = select_user_agent(robots_txt, user_agents).unwrap_or(first.as_str());

        let robot = Robot::new(agent, robots_txt.as_bytes()).map_err(|e| MatchError {
            message: e.to_string(),
        })?;
        let allowed = robot.allowed(url);
        trace!(agent, url, allowed, "evaluated robots.txt");
        Ok(allowed)
    }

    fn name(&self) -> &str {
        "texting_robots"
    }
}

// ---------------------------------------------------------------------------
// User-agent selection
// ---------------------------------------------------------------------------

/// Spellings of the user-agent key the parser accepts.
const USER_AGENT_KEYS: [&str; 3] = ["user-agent", "user agent", "useragent"];

/// Find the group that speaks for the first of `user_agents` declared in `robots_txt`.
///
/// Tokens are compared on their product token, case-insensitively, so
/// `FooBot` selects a `User-agent: FooBot/1.0` group. The returned value is the
/// group's `User-agent` value as written, which is what the parser matches on.
/// Returns `None` when only the `*` group (or nothing) applies.
pub fn select_user_agent<'r>(robots_txt: &'r str, user_agents: &[String]) -> Option<&'r str> {
    let body = robots_txt.strip_prefix('\u{feff}').unwrap_or(robots_txt);
    let declared: Vec<(&str, String)> = body
        .split(['\n', '\r', '\0'])
        .filter_map(user_agent_value)
        .filter_map(|value| {
            let token = product_token(value).to_ascii_lowercase();
            (!token.is_empty()).then_some((value, token))
        })
        .collect();

    user_agents.iter().find_map(|agent| {
        let wanted = product_token(agent).to_ascii_lowercase();
        if wanted.is_empty() {
            return None;
        }
        declared
            .iter()
            .find(|(_, token)| *token == wanted)
            .map(|(value, _)| *value)
    })
}

/// The product token of a user-agent string: its leading run of `[A-Za-z_-]`.
///
/// `FooBot/1.0` yields `FooBot`; `*` yields the empty string.
pub fn product_token(user_agent: &str) -> &str {
    let trimmed = user_agent.trim();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '_' || c == '-'))
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Value of a `User-agent` line, with any trailing comment removed.
///
/// The key may be followed by a colon or by whitespace alone.
fn user_agent_value(line: &str) -> Option<&str> {
    let line = line.split('#').next().unwrap_or_default().trim_start();
    let rest = USER_AGENT_KEYS.iter().find_map(|key| {
        line.get(..key.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(key))
            .map(|_| &line[key.len()..])
    })?;

    let after_space = rest.trim_start_matches([' ', '\t']);
    let value = match after_space.strip_prefix(':') {
        Some(value) => value,
        None if after_space.len() < rest.len() => after_space,
        None => return None,
    };
    Some(value.trim())
}
