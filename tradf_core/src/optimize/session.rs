use crate::error::{TradfError, TradfResult};
use serde::Serialize;
use std::fmt;

/// Lifecycle of a scheduling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Loaded,
    Analyzed,
    ConstraintsDerived,
    BaselineBuilt,
    Optimized,
    OptimizationFallback,
    /// Terminal; the only state whose results may be consumed
    Validated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Loaded => write!(f, "Loaded"),
            SessionState::Analyzed => write!(f, "Analyzed"),
            SessionState::ConstraintsDerived => write!(f, "ConstraintsDerived"),
            SessionState::BaselineBuilt => write!(f, "BaselineBuilt"),
            SessionState::Optimized => write!(f, "Optimized"),
            SessionState::OptimizationFallback => write!(f, "OptimizationFallback"),
            SessionState::Validated => write!(f, "Validated"),
        }
    }
}

/// What the session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionMode {
    /// Baseline handed to the solver
    Optimize,
    /// Randomly allocated baseline, no solver
    Random,
    /// User-supplied start times, no constraint derivation
    Manual,
}

/// Ordered record of the states a session went through
#[derive(Debug, Clone)]
pub struct Session {
    mode: SessionMode,
    history: Vec<SessionState>,
}

impl Session {
    /// Starts in `Loaded`; the graph was analyzed when it was built, so the
    /// session moves on to `Analyzed` right away
    pub fn start(mode: SessionMode) -> Self {
        Self {
            mode,
            history: vec![SessionState::Loaded, SessionState::Analyzed],
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        // history is never empty
        self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn is_validated(&self) -> bool {
        self.state() == SessionState::Validated
    }

    fn allows(&self, to: SessionState) -> bool {
        use SessionState::*;
        match (self.state(), to) {
            (Loaded, Analyzed) => true,
            (Analyzed, ConstraintsDerived) => self.mode != SessionMode::Manual,
            // a manual schedule is given, not derived
            (Analyzed, BaselineBuilt) => self.mode == SessionMode::Manual,
            (ConstraintsDerived, BaselineBuilt) => true,
            (BaselineBuilt, Optimized | OptimizationFallback) => self.mode == SessionMode::Optimize,
            (BaselineBuilt, Validated) => self.mode != SessionMode::Optimize,
            (Optimized | OptimizationFallback, Validated) => true,
            _ => false,
        }
    }

    pub fn advance(&mut self, to: SessionState) -> TradfResult<()> {
        if !self.allows(to) {
            return Err(TradfError::InvalidTransition {
                from: self.state().to_string(),
                to: to.to_string(),
            });
        }
        log::debug!("session ({:?}): {} -> {}", self.mode, self.state(), to);
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_optimize_path() {
        let mut session = Session::start(SessionMode::Optimize);
        session.advance(ConstraintsDerived).unwrap();
        session.advance(BaselineBuilt).unwrap();
        session.advance(OptimizationFallback).unwrap();
        session.advance(Validated).unwrap();
        assert!(session.is_validated());
        assert_eq!(
            session.history(),
            &[Loaded, Analyzed, ConstraintsDerived, BaselineBuilt, OptimizationFallback, Validated]
        );
    }

    #[test]
    fn test_no_skipping() {
        let mut session = Session::start(SessionMode::Optimize);
        assert!(session.advance(BaselineBuilt).is_err());
        session.advance(ConstraintsDerived).unwrap();
        session.advance(BaselineBuilt).unwrap();
        let err = session.advance(Validated).unwrap_err();
        assert!(matches!(err, TradfError::InvalidTransition { .. }));
        assert_eq!(session.state(), BaselineBuilt);
    }

    #[test]
    fn test_validated_is_terminal() {
        let mut session = Session::start(SessionMode::Random);
        session.advance(ConstraintsDerived).unwrap();
        session.advance(BaselineBuilt).unwrap();
        session.advance(Validated).unwrap();
        for state in [Loaded, Analyzed, ConstraintsDerived, BaselineBuilt, Optimized, Validated] {
            assert!(session.advance(state).is_err());
        }
    }

    #[test]
    fn test_manual_skips_derivation() {
        let mut session = Session::start(SessionMode::Manual);
        assert!(session.advance(ConstraintsDerived).is_err());
        session.advance(BaselineBuilt).unwrap();
        assert!(session.advance(Optimized).is_err());
        session.advance(Validated).unwrap();
    }
}
