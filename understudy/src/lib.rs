// vim: tw=80
//! Test doubles that record every call and verify interactions afterwards.
//!
//! Understudy creates substitute implementations of a trait.  A test programs
//! how the substitute answers calls, hands it to the code under test, and then
//! asks which calls were made, with what arguments, and how many times.
//!
//! # Usage
//!
//! Apply [`#[double]`](macro@double) to a trait.  That generates a
//! `Double<Trait>` struct which implements the trait by funnelling every
//! method into its [`Controller`].
//!
//! * Create the double with `mock()` or `stub()`.
//! * Configure answers with [`configure_return`](Controller::configure_return),
//!   [`configure_throw`](Controller::configure_throw) or
//!   [`configure_callback`](Controller::configure_callback).  Calls that
//!   nothing answers return their type's zero value.
//! * Hand the double to the code under test.
//! * Verify with [`assert_was_called`](Controller::assert_was_called) and
//!   friends.
//!
//! ```
//! use understudy::*;
//! use understudy::matcher::*;
//!
//! #[double]
//! trait Scores {
//!     fn get_magic_number(&self, s: &str) -> i32;
//! }
//!
//! let scores = DoubleScores::mock();
//! scores.configure_return(scores.sig_get_magic_number(), args![any()], 5)
//!     .unwrap()
//!     .once()
//!     .unwrap();
//! assert_eq!(5, scores.get_magic_number("x"));
//! assert_eq!(0, scores.get_magic_number("x"));
//! scores.assert_was_called_times(scores.sig_get_magic_number(),
//!                                args![any()],
//!                                Constraint::Exactly(2))
//!     .unwrap();
//! ```
//!
//! # Mocks and stubs
//!
//! Both record every call the same way.  They differ in how they treat
//! properties, pairs of `#[getter]` and `#[setter]` methods.  A stub's
//! settable properties keep whatever value they are set to, and accesses to
//! them are not interactions that verification sees.  A mock's properties
//! have no state unless
//! [`enable_property_behavior`](Controller::enable_property_behavior) is
//! used.
//!
//! # Matching arguments
//!
//! See the [`matcher`] module.  An argument list is all literals or all
//! matchers; mixing them is [`Error::MixedArgumentMode`].
//!
//! # Errors
//!
//! The [`Controller`] API returns [`Error`].  Generated trait methods can't,
//! so they [`raise`](Error::raise) instead.  An exception configured with
//! [`configure_throw`](Controller::configure_throw) unwinds with a [`Fault`]
//! payload.
//!
//! # Crate features
//!
//! * `nightly` - Better error messages from `#[double]`.  Requires the
//!   nightly compiler.

use std::sync::{Mutex, MutexGuard, PoisonError};

mod controller;
mod error;
mod expectation;
mod history;
mod interface;
pub mod matcher;
mod value;
mod verify;

pub use crate::controller::{Configured, Controller, Handler, Mode, Outcome};
pub use crate::error::{Error, Fault, Violation};
pub use crate::expectation::{
    Callback,
    Expectation,
    ExpectationRegistry,
    Invocation,
    Repeat,
    Resolved,
    Response
};
pub use crate::history::{CallHistory, InvocationRecord, RecordKind};
pub use crate::interface::{
    Interface,
    InterfaceBuilder,
    MemberKind,
    MethodSignature,
    Param,
    Passing,
    TypeDesc
};
pub use crate::matcher::{Arg, ArgumentMatcher};
pub use crate::value::{Describe, FromValue, Opaque, ToValue, Value};
pub use crate::verify::Constraint;
pub use predicates::prelude::{Predicate, predicate};
pub use understudy_derive::double;

/// Create a double whose interactions are the object of verification.
pub fn create_mock(interface: Interface) -> Controller {
    Controller::new(interface, Mode::Mock)
}

/// Create a double that only supplies state.
pub fn create_stub(interface: Interface) -> Controller {
    Controller::new(interface, Mode::Stub)
}

/// Lock a mutex, recovering it if a panicking callback poisoned it.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
