// vim: tw=80
use core::fmt::{self, Display};
use std::{error, sync::Arc};

use thiserror::Error;

use crate::{MethodSignature, verify::Constraint};

/// Everything that can go wrong while configuring, calling or verifying a
/// double.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument list's length differs from the member's parameter count.
    #[error("{signature}: expected {expected} arguments but got {actual}")]
    ArityMismatch {
        signature: String,
        expected: usize,
        actual: usize,
    },

    /// A multi-parameter argument list combined literals with matchers.
    #[error("{signature}: use matchers for every argument or for none; \
             wrap literals with matcher::eq")]
    MixedArgumentMode {
        signature: String,
    },

    #[error(transparent)]
    ExpectationViolation(#[from] Violation),

    /// The double was discarded and can no longer be used.
    #[error("this {interface} double has been discarded")]
    InvalidDoubleState {
        interface: String,
    },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{interface} has no member {member}")]
    UnknownMember {
        interface: String,
        member: String,
    },

    #[error("type mismatch: expected {expected} but got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
    },

    /// A configured exception.  Not a misuse of the double.
    #[error("{0}")]
    Thrown(Fault),
}

impl Error {
    /// Unwind with this error.
    ///
    /// Generated doubles implement trait methods that cannot return an
    /// `Error`, so they fail the way any mock does: by panicking.  A
    /// configured exception unwinds with its [`Fault`] as the panic payload
    /// so a test can recover it with `std::panic::catch_unwind`.
    pub fn raise(self) -> ! {
        match self {
            Error::Thrown(fault) => std::panic::panic_any(fault),
            e => panic!("{}", e)
        }
    }
}

/// A failed verification.
#[derive(Clone, Debug, Error)]
pub struct Violation {
    pub signature: Arc<MethodSignature>,
    pub expected: Constraint,
    pub actual: usize,
    /// Why the closest recorded call did not match, if there was one
    pub note: Option<String>,
}

impl Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Expected {} to be called {} but it was called {} times",
               self.signature, self.expected, self.actual)?;
        if let Some(note) = &self.note {
            write!(f, "\n{}", note)?;
        }
        Ok(())
    }
}

/// An exception configured with
/// [`configure_throw`](crate::Controller::configure_throw).
#[derive(Clone, Debug)]
pub struct Fault(Arc<dyn error::Error + Send + Sync>);

impl Fault {
    pub fn new<E>(e: E) -> Self
        where E: error::Error + Send + Sync + 'static
    {
        Fault(Arc::new(e))
    }

    pub fn downcast_ref<E: error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn is<E: error::Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&*self.0, f)
    }
}
