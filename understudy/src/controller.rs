// vim: tw=80
//! The per-double runtime that every proxied member funnels into.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};
use tracing::debug;

use crate::{
    Error,
    FromValue,
    Interface,
    MemberKind,
    MethodSignature,
    Value,
    expectation::{
        Callback,
        Expectation,
        ExpectationRegistry,
        Invocation,
        Repeat,
        Resolved,
        Response
    },
    error::Fault,
    history::{CallHistory, InvocationRecord, RecordKind},
    lock,
    matcher::{self, Arg, ArgumentMatcher},
};

/// Whether a double's interactions are the subject of the test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Interactions are verified.  Properties have no implicit state.
    Mock,
    /// Supplies state so the test can proceed.  Settable properties behave
    /// like plain fields.
    Stub,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Lifecycle {
    #[default]
    Active,
    Discarded,
}

/// An event handler attached through a double's event member.
pub type Handler = Box<dyn FnMut(&[Value]) + Send>;

#[derive(Default)]
pub(crate) struct State {
    lifecycle: Lifecycle,
    pub(crate) registry: ExpectationRegistry,
    pub(crate) history: CallHistory,
    store: HashMap<String, Value>,
    property_behavior: HashSet<String>,
    handlers: HashMap<String, Vec<Arc<Mutex<Handler>>>>,
}

/// The result of an intercepted call.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub value: Value,
    /// The arguments after any output and in/out rewriting
    pub args: Vec<Value>,
}

impl Outcome {
    /// Convert the returned value to a Rust type
    pub fn returned<T: FromValue>(self) -> Result<T, Error> {
        T::from_value(self.value)
    }
}

/// The runtime behind one test double.
///
/// It owns the double's call history and expectations.  It is meant to be
/// created by a test's setup and dropped, or [`discard`](Self::discard)ed,
/// by its teardown; nothing is shared between doubles.
pub struct Controller {
    interface: Arc<Interface>,
    mode: Mode,
    state: Mutex<State>,
}

impl Controller {
    pub fn new(interface: Interface, mode: Mode) -> Self {
        debug!(interface = interface.name(), ?mode, "created double");
        Controller {
            interface: Arc::new(interface),
            mode,
            state: Mutex::new(State::default())
        }
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Lock the state of a double that hasn't been discarded.
    pub(crate) fn active(&self) -> Result<MutexGuard<'_, State>, Error> {
        let state = lock(&self.state);
        if state.lifecycle == Lifecycle::Discarded {
            Err(Error::InvalidDoubleState {
                interface: self.interface.name().to_owned()
            })
        } else {
            Ok(state)
        }
    }

    pub fn is_discarded(&self) -> bool {
        lock(&self.state).lifecycle == Lifecycle::Discarded
    }

    /// End this double's life.
    ///
    /// Its history, expectations and property values are released, and
    /// every later operation fails with [`Error::InvalidDoubleState`].
    pub fn discard(&self) -> Result<(), Error> {
        let mut state = self.active()?;
        *state = State {
            lifecycle: Lifecycle::Discarded,
            ..State::default()
        };
        debug!(interface = self.interface.name(), "discarded double");
        Ok(())
    }

    /// Do accesses to this accessor read and write the backing store?
    fn behaves_as_state(&self, state: &State, signature: &MethodSignature)
        -> bool
    {
        signature.is_accessor() && (
            state.property_behavior.contains(signature.name()) ||
            (self.mode == Mode::Stub &&
             self.interface.is_settable(signature.name()))
        )
    }

    fn access_store(state: &mut State,
                    signature: &MethodSignature,
                    outcome: &mut Outcome)
    {
        match signature.kind() {
            MemberKind::Getter => {
                if let Some(v) = state.store.get(signature.name()) {
                    outcome.value = v.clone();
                }
            },
            MemberKind::Setter => {
                let v = outcome.args.first().cloned().unwrap_or_default();
                state.store.insert(signature.name().to_owned(), v);
            },
            _ => ()
        }
    }

    /// The entry point of every proxied member.
    ///
    /// Records the call, then answers it from the first matching
    /// expectation, the property backing store, or the return type's zero
    /// value, in that order.  An unconfigured call is never an error.
    pub fn intercept(&self, signature: &MethodSignature, args: Vec<Value>)
        -> Result<Outcome, Error>
    {
        let mut state = self.active()?;
        let signature = self.interface.resolve(signature)?;
        if signature.kind() == MemberKind::Event {
            return Err(Error::UnsupportedOperation(format!(
                "{} cannot be called; use attach_handler", signature)));
        }
        if args.len() != signature.params().len() {
            return Err(Error::ArityMismatch {
                signature: signature.to_string(),
                expected: signature.params().len(),
                actual: args.len()
            });
        }
        let kind = if self.behaves_as_state(&state, &signature) {
            RecordKind::StateAccess
        } else {
            RecordKind::Call
        };
        let seq = state.history.append(signature.clone(), args.clone(), kind);
        debug!(interface = self.interface.name(), member = %signature, seq,
               "intercepted call");

        let mut outcome = Outcome {
            value: signature.ret().zero_value(),
            args
        };
        let Some(Resolved{response, outputs, ..}) =
            state.registry.resolve(&signature, &outcome.args)
        else {
            if signature.kind() == MemberKind::Getter ||
               kind == RecordKind::StateAccess
            {
                Self::access_store(&mut state, &signature, &mut outcome);
            }
            return Ok(outcome);
        };
        for (i, v) in outputs {
            outcome.args[i] = v;
        }
        match response {
            Response::ReturnValue(v) => outcome.value = v,
            Response::ThrowException(fault) => return Err(Error::Thrown(fault)),
            Response::PropertyBackingStore => {
                Self::access_store(&mut state, &signature, &mut outcome);
            },
            Response::InvokeCallback(callback) => {
                // Callbacks may call back into this double
                drop(state);
                let mut inv = Invocation::new(signature, outcome.args,
                                              outcome.value);
                callback.call(&mut inv)?;
                let (args, value, fault) = inv.into_parts();
                if let Some(fault) = fault {
                    return Err(Error::Thrown(fault));
                }
                outcome = Outcome{value, args};
            }
        }
        Ok(outcome)
    }

    fn register(&self,
                signature: &MethodSignature,
                args: Vec<Arg>,
                response: Response) -> Result<Configured<'_>, Error>
    {
        let mut state = self.active()?;
        let signature = self.interface.resolve(signature)?;
        match signature.kind() {
            MemberKind::Event => {
                return Err(Error::UnsupportedOperation(format!(
                    "{} cannot be configured; use raise_event", signature)));
            },
            MemberKind::Getter | MemberKind::Setter
                if self.mode == Mode::Stub &&
                   self.interface.is_settable(signature.name()) =>
            {
                return Err(Error::UnsupportedOperation(format!(
                    "{} is a settable property of a stub; assign it instead",
                    signature.name())));
            },
            _ => ()
        }
        let matchers = matcher::normalize(&signature, args)?;
        let response = match response {
            Response::ReturnValue(v) => {
                Response::ReturnValue(signature.ret().coerce(v)?)
            },
            r => r
        };
        let e = Expectation::new(signature, matchers, response);
        let order = state.registry.register(e)?;
        Ok(Configured{controller: self, order})
    }

    /// Answer matching calls with `value`.
    pub fn configure_return<V>(&self,
                               signature: &MethodSignature,
                               args: Vec<Arg>,
                               value: V) -> Result<Configured<'_>, Error>
        where V: Into<Value>
    {
        self.register(signature, args, Response::ReturnValue(value.into()))
    }

    /// Fail matching calls with `e`.
    pub fn configure_throw<E>(&self,
                              signature: &MethodSignature,
                              args: Vec<Arg>,
                              e: E) -> Result<Configured<'_>, Error>
        where E: std::error::Error + Send + Sync + 'static
    {
        self.register(signature, args, Response::ThrowException(Fault::new(e)))
    }

    /// Answer matching calls by running `f`.
    ///
    /// `f` can inspect the arguments, choose the return value, set output
    /// parameters, or [`throw`](Invocation::throw).
    pub fn configure_callback<F>(&self,
                                 signature: &MethodSignature,
                                 args: Vec<Arg>,
                                 f: F) -> Result<Configured<'_>, Error>
        where F: FnMut(&mut Invocation) + Send + 'static
    {
        let response = Response::InvokeCallback(Callback::new(f));
        self.register(signature, args, response)
    }

    /// Single-threaded version of
    /// [`configure_callback`](Self::configure_callback), for closures that
    /// aren't `Send`.
    pub fn configure_callback_st<F>(&self,
                                    signature: &MethodSignature,
                                    args: Vec<Arg>,
                                    f: F) -> Result<Configured<'_>, Error>
        where F: FnMut(&mut Invocation) + 'static
    {
        let response = Response::InvokeCallback(Callback::new_st(f));
        self.register(signature, args, response)
    }

    /// Make a property keep whatever value it is set to.
    ///
    /// Stubs already treat their settable properties this way.  Accesses to
    /// such a property are no longer interactions that verification sees.
    pub fn enable_property_behavior(&self, property: &str)
        -> Result<(), Error>
    {
        let mut state = self.active()?;
        let getter = self.interface.getter(property)?;
        if !state.property_behavior.insert(property.to_owned()) {
            return Ok(());
        }
        let mut expectations = vec![
            Expectation::new(getter, Vec::new(), Response::PropertyBackingStore)
        ];
        if let Ok(setter) = self.interface.setter(property) {
            expectations.push(Expectation::new(setter,
                vec![ArgumentMatcher::Any], Response::PropertyBackingStore));
        }
        for e in expectations {
            state.registry.register(e)?;
        }
        debug!(interface = self.interface.name(), property,
               "enabled property behavior");
        Ok(())
    }

    /// Attach a handler to an event member.
    pub fn attach_handler(&self, event: &MethodSignature, handler: Handler)
        -> Result<(), Error>
    {
        let mut state = self.active()?;
        let event = self.event(event)?;
        state.handlers.entry(event.name().to_owned())
            .or_default()
            .push(Arc::new(Mutex::new(handler)));
        Ok(())
    }

    /// Synchronously invoke every handler attached to `event`, in the order
    /// they were attached.  Returns the number of handlers invoked.
    ///
    /// A handler that raises its own event again gets
    /// [`Error::UnsupportedOperation`] from the nested raise.
    pub fn raise_event(&self, event: &MethodSignature, args: Vec<Value>)
        -> Result<usize, Error>
    {
        let state = self.active()?;
        let event = self.event(event)?;
        let handlers = state.handlers.get(event.name())
            .cloned()
            .unwrap_or_default();
        // Handlers may call back into this double
        drop(state);
        debug!(interface = self.interface.name(), event = event.name(),
               handlers = handlers.len(), "raising event");
        for handler in handlers.iter() {
            let mut h = match handler.try_lock() {
                Ok(h) => h,
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    return Err(Error::UnsupportedOperation(format!(
                        "re-entrant handler for event {}", event.name())));
                }
            };
            (*h)(&args);
        }
        Ok(handlers.len())
    }

    fn event(&self, event: &MethodSignature)
        -> Result<Arc<MethodSignature>, Error>
    {
        let event = self.interface.resolve(event)?;
        if event.kind() == MemberKind::Event {
            Ok(event)
        } else {
            Err(Error::UnsupportedOperation(format!("{} is not an event",
                                                    event)))
        }
    }

    /// A copy of every call recorded so far, including property state
    /// accesses.
    pub fn history(&self) -> Result<Vec<InvocationRecord>, Error> {
        Ok(self.active()?.history.records().to_vec())
    }
}

/// A registered expectation, returned so its repeat policy can be adjusted.
///
/// Adjusting it after its double was discarded fails with
/// [`Error::InvalidDoubleState`].
pub struct Configured<'a> {
    controller: &'a Controller,
    order: usize,
}

impl<'a> Configured<'a> {
    fn with<F>(&mut self, f: F) -> Result<&mut Self, Error>
        where F: FnOnce(&mut Expectation)
    {
        let mut state = self.controller.active()?;
        if let Some(e) = state.registry.get_mut(self.order) {
            f(e);
        }
        drop(state);
        Ok(self)
    }

    /// Position of the expectation in its double's registry
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn repeat(&mut self, repeat: Repeat) -> Result<&mut Self, Error> {
        self.with(|e| e.set_repeat(repeat))
    }

    /// Answer only the first matching call.  Shortcut for
    /// [`times(1)`](#method.times).
    pub fn once(&mut self) -> Result<&mut Self, Error> {
        self.times(1)
    }

    pub fn twice(&mut self) -> Result<&mut Self, Error> {
        self.times(2)
    }

    /// Answer only the first `n` matching calls.
    pub fn times(&mut self, n: usize) -> Result<&mut Self, Error> {
        self.repeat(Repeat::Exactly(n))
    }

    pub fn at_least(&mut self, n: usize) -> Result<&mut Self, Error> {
        self.repeat(Repeat::AtLeast(n))
    }

    /// Mark the expectation as one that must be used for
    /// [`verify_all_expectations`](Controller::verify_all_expectations) to
    /// pass.
    pub fn required(&mut self) -> Result<&mut Self, Error> {
        self.with(|e| e.set_required(true))
    }
}
