// vim: tw=80
//! Post-hoc assertions about the calls a double received.

use core::fmt::{self, Display};
use predicates::prelude::Predicate;
use predicates_tree::CaseTreeExt;
use std::sync::Arc;
use tracing::debug;

use crate::{
    Controller,
    Error,
    MethodSignature,
    Value,
    error::Violation,
    history::CallHistory,
    matcher::{self, Arg, ArgumentMatcher},
};

/// How many matching calls an assertion requires.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Constraint {
    AtLeastOnce,
    Exactly(usize),
    AtLeast(usize),
    /// Any number, including zero
    Any,
}

impl Constraint {
    pub fn admits(&self, count: usize) -> bool {
        match self {
            Constraint::AtLeastOnce => count >= 1,
            Constraint::Exactly(n) => count == *n,
            Constraint::AtLeast(n) => count >= *n,
            Constraint::Any => true,
        }
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::AtLeastOnce
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constraint::AtLeastOnce => f.write_str("at least once"),
            Constraint::Exactly(1) => f.write_str("exactly once"),
            Constraint::Exactly(n) => write!(f, "exactly {} times", n),
            Constraint::AtLeast(n) => write!(f, "at least {} times", n),
            Constraint::Any => f.write_str("any number of times"),
        }
    }
}

/// Explain why the first recorded call to `signature` didn't match.
fn explain(history: &CallHistory,
           signature: &MethodSignature,
           matchers: &[ArgumentMatcher]) -> Option<String>
{
    let record = history.calls_to(signature)
        .find(|r| !matcher::all_match(matchers, r.args()))?;
    let mut note = format!("First call was #{}:", record.seq());
    for (i, (m, a)) in matchers.iter().zip(record.args()).enumerate() {
        if let Some(case) = m.find_case(false, a) {
            note.push_str(&format!("\n  arg {}: {}", i, case.tree()));
        }
    }
    Some(note)
}

fn check(history: &CallHistory,
         signature: Arc<MethodSignature>,
         matchers: &[ArgumentMatcher],
         expected: Constraint) -> Result<(), Error>
{
    let actual = history.count_matching(&signature, matchers);
    if expected.admits(actual) {
        return Ok(());
    }
    let note = explain(history, &signature, matchers);
    let v = Violation{signature, expected, actual, note};
    debug!(violation = %v, "verification failed");
    Err(v.into())
}

impl Controller {
    fn verify(&self,
              signature: &MethodSignature,
              args: Vec<Arg>,
              expected: Constraint) -> Result<(), Error>
    {
        let state = self.active()?;
        let signature = self.interface().resolve(signature)?;
        let matchers = matcher::normalize(&signature, args)?;
        check(&state.history, signature, &matchers, expected)
    }

    /// Assert that `signature` was called at least once with arguments
    /// matching `args`.
    pub fn assert_was_called(&self, signature: &MethodSignature, args: Vec<Arg>)
        -> Result<(), Error>
    {
        self.verify(signature, args, Constraint::AtLeastOnce)
    }

    /// Assert that the number of matching calls satisfies `expected`.
    pub fn assert_was_called_times(&self,
                                   signature: &MethodSignature,
                                   args: Vec<Arg>,
                                   expected: Constraint) -> Result<(), Error>
    {
        self.verify(signature, args, expected)
    }

    pub fn assert_was_not_called(&self,
                                 signature: &MethodSignature,
                                 args: Vec<Arg>) -> Result<(), Error>
    {
        self.verify(signature, args, Constraint::Exactly(0))
    }

    /// Check that every expectation marked
    /// [`required`](crate::Configured::required) answered at least one call.
    ///
    /// This only looks at the expectations themselves.  It cannot tell that
    /// the code under test never reached a call it should have made through
    /// some other member; prefer
    /// [`assert_was_called`](Self::assert_was_called).  Only the first unmet
    /// expectation is reported.
    pub fn verify_all_expectations(&self) -> Result<(), Error> {
        let state = self.active()?;
        let Some(e) = state.registry.first_unmet() else {
            return Ok(());
        };
        let v = Violation {
            signature: e.signature().clone(),
            expected: Constraint::AtLeastOnce,
            actual: e.consumed(),
            note: Some(format!("Unmet expectation {}", e))
        };
        debug!(violation = %v, "verification failed");
        Err(v.into())
    }

    /// The arguments of every call to `signature`, in call order.
    ///
    /// Property accesses served by the backing store are not included.
    pub fn recorded_arguments(&self, signature: &MethodSignature)
        -> Result<Vec<Vec<Value>>, Error>
    {
        let state = self.active()?;
        let signature = self.interface().resolve(signature)?;
        Ok(state.history.calls_to(&signature)
            .map(|r| r.args().to_vec())
            .collect())
    }
}
