// vim: tw=80
//! Expectations and the registry that resolves calls against them.

use core::fmt::{self, Display};
use fragile::Fragile;
use std::sync::{Arc, Mutex, TryLockError};
use tracing::trace;

use crate::{
    Error,
    Fault,
    MethodSignature,
    Value,
    matcher::{self, ArgumentMatcher},
};

/// How many calls an expectation may answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Repeat {
    Unbounded,
    /// Answer only the first `n` matching calls
    Exactly(usize),
    /// Answer at least `n` calls.  There is no upper bound, so for
    /// resolution this behaves like `Unbounded`.
    AtLeast(usize),
}

impl Repeat {
    fn has_budget(&self, consumed: usize) -> bool {
        match self {
            Repeat::Unbounded | Repeat::AtLeast(_) => true,
            Repeat::Exactly(n) => consumed < *n,
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Unbounded
    }
}

impl Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Repeat::Unbounded => f.write_str("any number of times"),
            Repeat::Exactly(n) => write!(f, "exactly {} times", n),
            Repeat::AtLeast(n) => write!(f, "at least {} times", n),
        }
    }
}

/// A call in progress, as seen by a callback.
///
/// `return_value` starts out as the member's zero value.  Writing to
/// `arguments` sets output and in/out parameters.
#[derive(Debug)]
pub struct Invocation {
    signature: Arc<MethodSignature>,
    pub arguments: Vec<Value>,
    pub return_value: Value,
    fault: Option<Fault>,
}

impl Invocation {
    pub(crate) fn new(signature: Arc<MethodSignature>,
                      arguments: Vec<Value>,
                      return_value: Value) -> Self
    {
        Invocation{signature, arguments, return_value, fault: None}
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.arguments.get(i)
    }

    /// Make the call fail with `e` once the callback returns.
    pub fn throw<E>(&mut self, e: E)
        where E: std::error::Error + Send + Sync + 'static
    {
        self.fault = Some(Fault::new(e));
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Value, Option<Fault>) {
        (self.arguments, self.return_value, self.fault)
    }
}

type CallbackFn = Box<dyn FnMut(&mut Invocation) + Send>;

/// A shared, user-supplied side effect.
#[derive(Clone)]
pub struct Callback(Arc<Mutex<CallbackFn>>);

impl Callback {
    pub fn new<F>(f: F) -> Self
        where F: FnMut(&mut Invocation) + Send + 'static
    {
        Callback(Arc::new(Mutex::new(Box::new(f))))
    }

    /// Like [`new`](Self::new), but for closures that aren't `Send`.
    ///
    /// The callback will panic if it is invoked from any thread other than
    /// the one that created it.
    pub fn new_st<F>(f: F) -> Self
        where F: FnMut(&mut Invocation) + 'static
    {
        let mut fragile = Fragile::new(f);
        let fmut = move |inv: &mut Invocation| {
            (fragile.get_mut())(inv)
        };
        Callback::new(fmut)
    }

    /// Run the callback.
    ///
    /// A callback that, directly or through its double, ends up invoking
    /// itself again fails with [`Error::UnsupportedOperation`] instead of
    /// deadlocking.
    pub fn call(&self, inv: &mut Invocation) -> Result<(), Error> {
        let mut f = match self.0.try_lock() {
            Ok(f) => f,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(Error::UnsupportedOperation(format!(
                    "re-entrant callback for {}", inv.signature())));
            }
        };
        (*f)(inv);
        Ok(())
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// What an expectation does when it answers a call.
#[derive(Clone, Debug)]
pub enum Response {
    ReturnValue(Value),
    ThrowException(Fault),
    InvokeCallback(Callback),
    /// Read or write the double's property backing store
    PropertyBackingStore,
}

/// A rule mapping a call pattern to a response.
#[derive(Debug)]
pub struct Expectation {
    signature: Arc<MethodSignature>,
    matchers: Vec<ArgumentMatcher>,
    response: Response,
    repeat: Repeat,
    consumed: usize,
    required: bool,
    order: usize,
}

impl Expectation {
    pub fn new(signature: Arc<MethodSignature>,
               matchers: Vec<ArgumentMatcher>,
               response: Response) -> Self
    {
        Expectation {
            signature,
            matchers,
            response,
            repeat: Repeat::default(),
            consumed: 0,
            required: false,
            order: 0
        }
    }

    pub fn signature(&self) -> &Arc<MethodSignature> {
        &self.signature
    }

    pub fn matchers(&self) -> &[ArgumentMatcher] {
        &self.matchers
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// How many calls this expectation has answered
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Must this expectation be used before
    /// [`verify_all_expectations`](crate::Controller::verify_all_expectations)
    /// passes?
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Position among its registry's expectations
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn set_repeat(&mut self, repeat: Repeat) {
        self.repeat = repeat;
    }

    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    fn accepts(&self, signature: &MethodSignature, args: &[Value]) -> bool {
        self.signature.as_ref() == signature &&
            self.repeat.has_budget(self.consumed) &&
            matcher::all_match(&self.matchers, args)
    }
}

impl Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {} with (", self.order, self.signature)?;
        for (i, m) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", m)?;
        }
        write!(f, ") {}", self.repeat)
    }
}

/// The outcome of resolving a call.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub response: Response,
    /// Output and in/out parameters to overwrite, by position
    pub outputs: Vec<(usize, Value)>,
    /// Which expectation answered
    pub order: usize,
}

/// An ordered collection of expectations belonging to one double.
#[derive(Debug, Default)]
pub struct ExpectationRegistry {
    expectations: Vec<Expectation>,
}

impl ExpectationRegistry {
    /// Append an expectation and return its registration order.
    pub fn register(&mut self, mut e: Expectation) -> Result<usize, Error> {
        let expected = e.signature.params().len();
        if e.matchers.len() != expected {
            return Err(Error::ArityMismatch {
                signature: e.signature.to_string(),
                expected,
                actual: e.matchers.len()
            });
        }
        e.order = self.expectations.len();
        self.expectations.push(e);
        Ok(self.expectations.len() - 1)
    }

    /// Find the first-registered expectation that accepts this call and
    /// still has budget, and consume one use of it.
    pub fn resolve(&mut self, signature: &MethodSignature, args: &[Value])
        -> Option<Resolved>
    {
        let e = self.expectations.iter_mut()
            .find(|e| e.accepts(signature, args))?;
        e.consumed += 1;
        trace!(expectation = %e, consumed = e.consumed, "resolved");
        let outputs = e.matchers.iter()
            .enumerate()
            .filter_map(|(i, m)| m.output().map(|v| (i, v.clone())))
            .collect();
        Some(Resolved{response: e.response.clone(), outputs, order: e.order})
    }

    pub fn get(&self, order: usize) -> Option<&Expectation> {
        self.expectations.get(order)
    }

    pub fn get_mut(&mut self, order: usize) -> Option<&mut Expectation> {
        self.expectations.get_mut(order)
    }

    pub fn iter(&self) -> impl Iterator<Item=&Expectation> {
        self.expectations.iter()
    }

    /// The first required expectation that was never used
    pub fn first_unmet(&self) -> Option<&Expectation> {
        self.expectations.iter().find(|e| e.required && e.consumed == 0)
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{MemberKind, Param, TypeDesc, matcher::{any, eq}};

    fn get_number() -> Arc<MethodSignature> {
        Arc::new(MethodSignature::new("get_number", MemberKind::Method,
            vec![Param::new("s", TypeDesc::Str)], TypeDesc::Int))
    }

    fn returning(m: ArgumentMatcher, v: i64) -> Expectation {
        Expectation::new(get_number(), vec![m],
                         Response::ReturnValue(Value::Int(v)))
    }

    fn resolved_value(r: Option<Resolved>) -> Option<Value> {
        r.map(|r| match r.response {
            Response::ReturnValue(v) => v,
            other => panic!("unexpected response {:?}", other)
        })
    }

    #[test]
    fn first_registered_wins() {
        let mut reg = ExpectationRegistry::default();
        reg.register(returning(any(), 1)).unwrap();
        reg.register(returning(eq("x"), 2)).unwrap();
        let args = [Value::from("x")];
        assert_eq!(Some(Value::Int(1)),
                   resolved_value(reg.resolve(&get_number(), &args)));
    }

    #[test]
    fn exactly_n_exhausts() {
        let mut reg = ExpectationRegistry::default();
        let mut e = returning(any(), 5);
        e.set_repeat(Repeat::Exactly(2));
        reg.register(e).unwrap();
        let args = [Value::from("x")];
        assert!(reg.resolve(&get_number(), &args).is_some());
        assert!(reg.resolve(&get_number(), &args).is_some());
        assert!(reg.resolve(&get_number(), &args).is_none());
        assert_eq!(2, reg.get(0).unwrap().consumed());
    }

    #[test]
    fn exhausted_expectation_falls_through_to_the_next() {
        let mut reg = ExpectationRegistry::default();
        let mut first = returning(any(), 5);
        first.set_repeat(Repeat::Exactly(1));
        let mut second = returning(any(), 7);
        second.set_repeat(Repeat::Exactly(1));
        reg.register(first).unwrap();
        reg.register(second).unwrap();
        let args = [Value::from("foo")];
        assert_eq!(Some(Value::Int(5)),
                   resolved_value(reg.resolve(&get_number(), &args)));
        assert_eq!(Some(Value::Int(7)),
                   resolved_value(reg.resolve(&get_number(), &args)));
        assert_eq!(None, resolved_value(reg.resolve(&get_number(), &args)));
    }

    #[test]
    fn at_least_has_no_upper_bound() {
        let mut reg = ExpectationRegistry::default();
        let mut e = returning(any(), 5);
        e.set_repeat(Repeat::AtLeast(1));
        reg.register(e).unwrap();
        for _ in 0..10 {
            assert!(reg.resolve(&get_number(), &[Value::Null]).is_some());
        }
    }

    #[test]
    fn register_checks_arity() {
        let mut reg = ExpectationRegistry::default();
        let e = Expectation::new(get_number(), vec![any(), any()],
                                 Response::PropertyBackingStore);
        let r = reg.register(e);
        assert!(matches!(r, Err(Error::ArityMismatch{expected: 1, actual: 2, ..})));
        assert!(reg.is_empty());
    }

    #[test]
    fn first_unmet() {
        let mut reg = ExpectationRegistry::default();
        let mut e = returning(eq("foo"), 1);
        e.set_required(true);
        reg.register(returning(any(), 0)).unwrap();
        reg.register(e).unwrap();
        assert_eq!(1, reg.first_unmet().unwrap().order());
        reg.resolve(&get_number(), &[Value::from("foo")]);
        // The unbounded "any" expectation answered, so #1 is still unmet
        assert_eq!(1, reg.first_unmet().unwrap().order());
    }

    #[test]
    fn outputs() {
        let sig = Arc::new(MethodSignature::new("m", MemberKind::Method,
            vec![Param::out("i", TypeDesc::Int)], TypeDesc::Unit));
        let mut reg = ExpectationRegistry::default();
        let e = Expectation::new(sig.clone(), vec![matcher::out_value(10)],
                                 Response::ReturnValue(Value::Unit));
        reg.register(e).unwrap();
        let r = reg.resolve(&sig, &[Value::Int(12345)]).unwrap();
        assert_eq!(vec![(0, Value::Int(10))], r.outputs);
    }

    #[test]
    fn callback_st() {
        let hits = std::rc::Rc::new(std::cell::Cell::new(0));
        let h = hits.clone();
        let cb = Callback::new_st(move |inv: &mut Invocation| {
            h.set(h.get() + 1);
            inv.return_value = Value::Int(h.get());
        });
        let mut inv = Invocation::new(get_number(), vec![Value::Null],
                                      Value::Int(0));
        cb.call(&mut inv).unwrap();
        cb.call(&mut inv).unwrap();
        assert_eq!(2, hits.get());
        assert_eq!(Value::Int(2), inv.return_value);
    }

    #[test]
    fn callback_rejects_reentry() {
        let slot: Arc<Mutex<Option<Callback>>> = Arc::default();
        let s = slot.clone();
        let cb = Callback::new(move |inv: &mut Invocation| {
            let me = s.lock().unwrap().clone().unwrap();
            let mut nested = Invocation::new(get_number(), vec![Value::Null],
                                             Value::Int(0));
            let r = me.call(&mut nested);
            assert!(matches!(r, Err(Error::UnsupportedOperation(_))));
            inv.return_value = Value::Int(1);
        });
        *slot.lock().unwrap() = Some(cb.clone());
        let mut inv = Invocation::new(get_number(), vec![Value::Null],
                                      Value::Int(0));
        cb.call(&mut inv).unwrap();
        assert_eq!(Value::Int(1), inv.return_value);
        // Break the reference cycle
        slot.lock().unwrap().take();
    }
}
