/// Request lifecycle states
///
/// A single `do_request`/`extract` call walks these states in order. Gates that
/// are not configured still advance the state, so every successful call passes
/// through the same sequence.
use crate::{Result, TrawlError};
use std::fmt;
use tracing::trace;

/// Represents the current state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    // ===== Active States =====
    /// Request was created but nothing was checked yet
    Idle,

    /// Dependencies and rule set were validated
    Validated,

    /// Robots policy allowed the request (or was skipped)
    RobotsChecked,

    /// Pacing delay elapsed (or was skipped)
    Paced,

    /// Transport returned a response
    Fetched,

    /// A decoder matched the response content type
    ContentDispatched,

    /// Selectors were evaluated against the decoded content
    Extracted,

    // ===== Terminal States =====
    /// Request completed
    Done,

    /// Request aborted, with the kind of the error that aborted it
    Failed(&'static str),
}

impl RequestState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Returns true if moving to `next` is a valid step
    ///
    /// `Failed` is reachable from every non-terminal state. A fetched response
    /// may finish directly when nothing has to be extracted.
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed(_)) {
            return true;
        }

        matches!(
            (self, next),
            (Idle, Validated)
                | (Validated, RobotsChecked)
                | (RobotsChecked, Paced)
                | (Paced, Fetched)
                | (Fetched, ContentDispatched)
                | (Fetched, Done)
                | (ContentDispatched, Extracted)
                | (Extracted, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validated => "validated",
            Self::RobotsChecked => "robots_checked",
            Self::Paced => "paced",
            Self::Fetched => "fetched",
            Self::ContentDispatched => "content_dispatched",
            Self::Extracted => "extracted",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(kind) => write!(f, "failed({})", kind),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// Tracks the state of one request and rejects invalid transitions
#[derive(Debug)]
pub struct Lifecycle {
    url: String,
    state: RequestState,
}

impl Lifecycle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: RequestState::Idle,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Moves to `next`
    pub fn advance(&mut self, next: RequestState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(TrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        trace!(url = %self.url, from = %self.state, to = %next, "Request state");
        self.state = next;
        Ok(())
    }

    /// Marks the request as failed by `err`, unless it already finished
    ///
    /// # Arguments
    ///
    /// * `err` - The error that aborted the request; its kind is kept in
    ///   [`RequestState::Failed`]
    pub fn fail(&mut self, err: &TrawlError) {
        if !self.state.is_terminal() {
            trace!(url = %self.url, from = %self.state, kind = err.kind(), "Request failed");
            self.state = RequestState::Failed(err.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestState::*;

    #[test]
    fn test_is_terminal() {
        assert!(Done.is_terminal());
        assert!(Failed("transport").is_terminal());

        assert!(!Idle.is_terminal());
        assert!(!Fetched.is_terminal());
        assert!(!Extracted.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Idle,
            Validated,
            RobotsChecked,
            Paced,
            Fetched,
            ContentDispatched,
            Extracted,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be valid",
                pair[0],
                pair[1]
            );
        }

        assert!(Fetched.can_transition_to(Done));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Idle.can_transition_to(Fetched));
        assert!(!Validated.can_transition_to(Paced));
        assert!(!ContentDispatched.can_transition_to(Done));
        assert!(!Done.can_transition_to(Idle));
        assert!(!Failed("panic").can_transition_to(Failed("panic")));
    }

    #[test]
    fn test_failed_reachable_from_active_states() {
        for state in [
            Idle,
            Validated,
            RobotsChecked,
            Paced,
            Fetched,
            ContentDispatched,
            Extracted,
        ] {
            assert!(state.can_transition_to(Failed("transport")), "{} -> failed", state);
        }
        assert!(!Done.can_transition_to(Failed("transport")));
    }

    #[test]
    fn test_lifecycle_advance() {
        let mut lifecycle = Lifecycle::new("https://ex.test/");
        lifecycle.advance(Validated).unwrap();
        assert_eq!(lifecycle.state(), Validated);

        let err = lifecycle.advance(Done).unwrap_err();
        assert!(matches!(
            err,
            TrawlError::InvalidTransition {
                from: Validated,
                to: Done
            }
        ));
        assert_eq!(lifecycle.state(), Validated);
    }

    #[test]
    fn test_lifecycle_fail_keeps_terminal_state() {
        let mut lifecycle = Lifecycle::new("https://ex.test/");
        lifecycle.fail(&TrawlError::RobotsDenied {
            url: "https://ex.test/".to_string(),
        });
        assert_eq!(lifecycle.state(), Failed("robots_denied"));

        lifecycle.fail(&TrawlError::Panic("late".to_string()));
        assert_eq!(lifecycle.state(), Failed("robots_denied"));

        let mut done = Lifecycle::new("https://ex.test/");
        for next in [Validated, RobotsChecked, Paced, Fetched, Done] {
            done.advance(next).unwrap();
        }
        done.fail(&TrawlError::MissingDependency("transport"));
        assert_eq!(done.state(), Done);
    }

    #[test]
    fn test_display() {
        assert_eq!(RobotsChecked.to_string(), "robots_checked");
        assert_eq!(ContentDispatched.to_string(), "content_dispatched");
        assert_eq!(Failed("not_match").to_string(), "failed(not_match)");
        assert_eq!(Failed("not_match").as_str(), "failed");
    }
}
