// vim: tw=80
//! Argument matchers.
//!
//! Every argument position of an expectation or verification query is
//! either a literal, which must equal the actual argument, or an
//! [`ArgumentMatcher`].  Build argument lists with the [`args!`] macro:
//!
//! ```
//! use understudy::{args, matcher::*};
//! let by_value = args!["first string", "second string"];
//! let by_matcher = args![eq("first string"), any()];
//! ```
//!
//! Literals and matchers cannot be mixed in one argument list.
//!
//! [`args!`]: crate::args

use core::fmt::{self, Display};
use predicates::{
    prelude::{Predicate, predicate},
    reflection::{Case, PredicateReflection, Product}
};
use std::sync::Arc;

use crate::{Error, MethodSignature, Passing, Value};

/// A predicate over one argument.
#[derive(Clone)]
pub enum ArgumentMatcher {
    Exact(Value),
    Any,
    Predicate(Arc<dyn Predicate<Value> + Send + Sync>),
    /// Every listed value is somewhere in the actual list
    ListContainsAll(Vec<Value>),
    /// The actual list has an element at this index, and it matches
    ListElementAt(usize, Box<ArgumentMatcher>),
    ListCountEquals(usize),
    ListEqualsOrdered(Vec<Value>),
    /// Matches anything, and sets an output parameter
    OutValue(Value),
    /// Rewrites an in/out parameter when its input matches
    RefMatch(Box<ArgumentMatcher>, Value),
}

impl ArgumentMatcher {
    pub fn matches(&self, actual: &Value) -> bool {
        match self {
            ArgumentMatcher::Exact(v) => v == actual,
            ArgumentMatcher::Any => true,
            ArgumentMatcher::Predicate(p) => p.eval(actual),
            ArgumentMatcher::ListContainsAll(expected) => match actual {
                Value::List(l) => expected.iter().all(|e| l.contains(e)),
                _ => false
            },
            ArgumentMatcher::ListElementAt(i, m) => {
                actual.as_list()
                    .and_then(|l| l.get(*i))
                    .map_or(false, |e| m.matches(e))
            },
            ArgumentMatcher::ListCountEquals(n) => {
                actual.as_list().map_or(false, |l| l.len() == *n)
            },
            ArgumentMatcher::ListEqualsOrdered(expected) => {
                actual.as_list().map_or(false, |l| l == expected.as_slice())
            },
            ArgumentMatcher::OutValue(_) => true,
            ArgumentMatcher::RefMatch(m, _) => m.matches(actual),
        }
    }

    /// The value this matcher writes back to its parameter, if any
    pub fn output(&self) -> Option<&Value> {
        match self {
            ArgumentMatcher::OutValue(v) => Some(v),
            ArgumentMatcher::RefMatch(_, v) => Some(v),
            _ => None
        }
    }
}

impl Display for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArgumentMatcher::Exact(v) => write!(f, "var == {}", v),
            ArgumentMatcher::Any => f.write_str("any"),
            ArgumentMatcher::Predicate(p) => write!(f, "{}", p),
            ArgumentMatcher::ListContainsAll(l) =>
                write!(f, "var contains all of {}", Value::List(l.clone())),
            ArgumentMatcher::ListElementAt(i, m) =>
                write!(f, "var[{}] matches ({})", i, m),
            ArgumentMatcher::ListCountEquals(n) =>
                write!(f, "var.len() == {}", n),
            ArgumentMatcher::ListEqualsOrdered(l) =>
                write!(f, "var == {} in order", Value::List(l.clone())),
            ArgumentMatcher::OutValue(v) => write!(f, "out {}", v),
            ArgumentMatcher::RefMatch(m, v) => write!(f, "ref ({}) -> {}", m, v),
        }
    }
}

impl fmt::Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ArgumentMatcher({})", self)
    }
}

impl PredicateReflection for ArgumentMatcher {}

impl Predicate<Value> for ArgumentMatcher {
    fn eval(&self, variable: &Value) -> bool {
        self.matches(variable)
    }

    fn find_case<'a>(&'a self, expected: bool, variable: &Value)
        -> Option<Case<'a>>
    {
        let result = self.matches(variable);
        if result != expected {
            return None;
        }
        let case = Case::new(Some(self), result);
        let case = match self {
            ArgumentMatcher::Predicate(p) => {
                match p.find_case(expected, variable) {
                    Some(child) => case.add_child(child),
                    None => case
                }
            },
            ArgumentMatcher::RefMatch(m, _) => {
                match m.find_case(expected, variable) {
                    Some(child) => case.add_child(child),
                    None => case
                }
            },
            ArgumentMatcher::ListElementAt(i, m) => {
                match variable.as_list() {
                    Some(l) if *i < l.len() => {
                        match m.find_case(expected, &l[*i]) {
                            Some(child) => case.add_child(child),
                            None => case
                        }
                    },
                    Some(l) => case.add_product(Product::new("len", l.len())),
                    None => case
                }
            },
            ArgumentMatcher::ListContainsAll(values) => {
                let missing = variable.as_list().map(|l| {
                    values.iter()
                        .filter(|v| !l.contains(v))
                        .cloned()
                        .collect::<Vec<_>>()
                });
                match missing {
                    Some(m) if !m.is_empty() =>
                        case.add_product(Product::new("missing",
                                                      Value::List(m))),
                    _ => case
                }
            },
            ArgumentMatcher::ListCountEquals(_) => {
                match variable.as_list() {
                    Some(l) => case.add_product(Product::new("len", l.len())),
                    None => case
                }
            },
            _ => case
        };
        Some(case.add_product(Product::new("var", variable.clone())))
    }
}

/// One position of an argument list: a literal or a matcher.
#[derive(Clone, Debug)]
pub enum Arg {
    Literal(Value),
    Matcher(ArgumentMatcher),
}

/// Anything that can stand in an [`args!`](crate::args) list.
pub trait IntoArg {
    fn into_arg(self) -> Arg;
}

impl IntoArg for Arg {
    fn into_arg(self) -> Arg {
        self
    }
}

impl IntoArg for ArgumentMatcher {
    fn into_arg(self) -> Arg {
        Arg::Matcher(self)
    }
}

macro_rules! literal_args {
    ($($t:ty),*) => {
        $(
            impl IntoArg for $t {
                fn into_arg(self) -> Arg {
                    Arg::Literal(Value::from(self))
                }
            }
        )*
    }
}

literal_args!{bool, char, (), i8, i16, i32, i64, isize, u8, u16, u32, u64,
              usize, f32, f64, &str, String}

impl IntoArg for Value {
    fn into_arg(self) -> Arg {
        Arg::Literal(self)
    }
}

impl<T: Into<Value>> IntoArg for Vec<T> {
    fn into_arg(self) -> Arg {
        Arg::Literal(Value::from(self))
    }
}

impl<T: Clone + Into<Value>> IntoArg for &[T] {
    fn into_arg(self) -> Arg {
        Arg::Literal(Value::from(self))
    }
}

impl<T: Into<Value>> IntoArg for Option<T> {
    fn into_arg(self) -> Arg {
        Arg::Literal(Value::from(self))
    }
}

/// Build an argument list from literals or matchers.
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::matcher::Arg>::new()
    };
    ($($a:expr),+ $(,)?) => {
        ::std::vec![$($crate::matcher::IntoArg::into_arg($a)),+]
    };
}

/// Check an argument list against `signature` and turn it into matchers.
///
/// Literals become [`ArgumentMatcher::Exact`], converted to their parameter's
/// type by [`TypeDesc::coerce`](crate::TypeDesc::coerce).
pub fn normalize(signature: &MethodSignature, args: Vec<Arg>)
    -> Result<Vec<ArgumentMatcher>, Error>
{
    let params = signature.params();
    if args.len() != params.len() {
        return Err(Error::ArityMismatch {
            signature: signature.to_string(),
            expected: params.len(),
            actual: args.len()
        });
    }
    let literals = args.iter()
        .filter(|a| matches!(a, Arg::Literal(_)))
        .count();
    if args.len() > 1 && literals > 0 && literals < args.len() {
        return Err(Error::MixedArgumentMode {
            signature: signature.to_string()
        });
    }
    let matchers = args.into_iter()
        .zip(params)
        .map(|(a, p)| match a {
            Arg::Literal(v) => p.ty.coerce(v).map(ArgumentMatcher::Exact),
            Arg::Matcher(m) => Ok(m)
        }).collect::<Result<Vec<_>, _>>()?;
    for (m, p) in matchers.iter().zip(params) {
        let legal = match m {
            ArgumentMatcher::OutValue(_) => p.passing != Passing::Value,
            ArgumentMatcher::RefMatch(..) => p.passing == Passing::Ref,
            _ => true
        };
        if !legal {
            return Err(Error::UnsupportedOperation(format!(
                "{}: parameter {} cannot be written by \"{}\"",
                signature, p.name, m)));
        }
    }
    Ok(matchers)
}

/// Do all of `matchers` accept `args`, position by position?
pub fn all_match(matchers: &[ArgumentMatcher], args: &[Value]) -> bool {
    matchers.len() == args.len() &&
        matchers.iter().zip(args).all(|(m, a)| m.matches(a))
}

/// Match any argument, including null.
pub fn any() -> ArgumentMatcher {
    ArgumentMatcher::Any
}

/// Match an argument equal to `v`.
pub fn eq<V: Into<Value>>(v: V) -> ArgumentMatcher {
    ArgumentMatcher::Exact(v.into())
}

/// Match an argument that satisfies a closure.
///
/// The closure sees every argument, including [`Value::Null`].
pub fn matches<F>(f: F) -> ArgumentMatcher
    where F: Fn(&Value) -> bool + Send + Sync + 'static
{
    is(predicate::function(f))
}

/// Match with any [`Predicate`] from the `predicates` crate.
///
/// ```
/// use understudy::{Value, matcher::*, predicate};
/// let m = is(predicate::gt(Value::Int(2)));
/// assert!(m.matches(&Value::Int(3)));
/// ```
pub fn is<P>(p: P) -> ArgumentMatcher
    where P: Predicate<Value> + Send + Sync + 'static
{
    ArgumentMatcher::Predicate(Arc::new(p))
}

/// Match an argument equal to one of `values`.
pub fn one_of<I, V>(values: I) -> ArgumentMatcher
    where I: IntoIterator<Item=V>, V: Into<Value>
{
    is(predicate::in_iter(values.into_iter().map(Into::into)))
}

/// Match a list that contains at least these values, in any order.
pub fn contains_all<I, V>(values: I) -> ArgumentMatcher
    where I: IntoIterator<Item=V>, V: Into<Value>
{
    ArgumentMatcher::ListContainsAll(values.into_iter().map(Into::into)
                                     .collect())
}

/// Match a list whose element at `index` matches `m`.
pub fn element_at(index: usize, m: ArgumentMatcher) -> ArgumentMatcher {
    ArgumentMatcher::ListElementAt(index, Box::new(m))
}

/// Match a list of exactly `n` elements.
pub fn count(n: usize) -> ArgumentMatcher {
    ArgumentMatcher::ListCountEquals(n)
}

/// Match a list with exactly these elements, in this order.
pub fn list_eq<I, V>(values: I) -> ArgumentMatcher
    where I: IntoIterator<Item=V>, V: Into<Value>
{
    ArgumentMatcher::ListEqualsOrdered(values.into_iter().map(Into::into)
                                       .collect())
}

/// Set an output parameter to `v`.
pub fn out_value<V: Into<Value>>(v: V) -> ArgumentMatcher {
    ArgumentMatcher::OutValue(v.into())
}

/// Rewrite an in/out parameter to `v` when its input matches `m`.
pub fn ref_match<V: Into<Value>>(m: ArgumentMatcher, v: V) -> ArgumentMatcher
{
    ArgumentMatcher::RefMatch(Box::new(m), v.into())
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{MemberKind, Param, TypeDesc};
    use predicates_tree::CaseTreeExt;

    fn publish_winners() -> MethodSignature {
        MethodSignature::new("publish_winners", MemberKind::Method,
            vec![Param::new("first", TypeDesc::Str),
                 Param::new("second", TypeDesc::Str)],
            TypeDesc::Unit)
    }

    fn scores(v: &[i64]) -> Value {
        Value::from(v.to_vec())
    }

    #[test]
    fn contains_all_ignores_order_and_duplicates() {
        let m = contains_all(vec![5, 3, 4, 3]);
        assert!(m.matches(&scores(&[0, 1, 2, 3, 4, 5, 6])));
        assert!(!m.matches(&scores(&[0, 1, 2, 4])));
        assert!(!m.matches(&Value::Null));
    }

    #[test]
    fn element_at_out_of_range_is_no_match() {
        let m = element_at(3, is(predicate::gt(Value::Int(2))));
        assert!(m.matches(&scores(&[0, 6, 1, 5])));
        assert!(!m.matches(&scores(&[0, 6, 1])));
        assert!(!m.matches(&scores(&[0, 6, 1, 2])));
    }

    #[test]
    fn count_and_list_eq() {
        let actual = scores(&[0, 3, 1, 2]);
        assert!(count(4).matches(&actual));
        assert!(!count(3).matches(&actual));
        assert!(list_eq(vec![0, 3, 1, 2]).matches(&actual));
        assert!(!list_eq(vec![0, 1, 2, 3]).matches(&actual));
    }

    #[test]
    fn predicates_see_null() {
        let m = matches(|v: &Value| v.as_str().map_or(false, |s| s.len() > 2));
        assert!(m.matches(&Value::from("foo")));
        assert!(!m.matches(&Value::from("fo")));
        assert!(!m.matches(&Value::Null));
    }

    #[test]
    fn one_of_list() {
        let m = one_of(vec!["hello", "hi", "o hai"]);
        assert!(m.matches(&Value::from("hi")));
        assert!(!m.matches(&Value::from("howdy")));
    }

    #[test]
    fn ref_match_depends_on_input() {
        let m = ref_match(eq("input"), "output");
        assert!(m.matches(&Value::from("input")));
        assert!(!m.matches(&Value::from("other")));
        assert_eq!(Some(&Value::from("output")), m.output());
    }

    #[test]
    fn explains_missing_elements() {
        let m = contains_all(vec![3, 4, 5]);
        let actual = scores(&[0, 1, 2, 4]);
        let case = m.find_case(false, &actual).unwrap();
        let tree = case.tree().to_string();
        assert!(tree.contains("missing"), "{}", tree);
        assert!(tree.contains("[3, 5]"), "{}", tree);
        assert!(m.find_case(true, &actual).is_none());
    }

    #[test]
    fn normalize_literals() {
        let m = normalize(&publish_winners(), args!["a", "b"]).unwrap();
        assert!(matches!(&m[0], ArgumentMatcher::Exact(Value::Str(s)) if s == "a"));
    }

    #[test]
    fn normalize_fits_literals_to_their_parameter() {
        let scale = MethodSignature::new("scale", MemberKind::Method,
            vec![Param::new("factor", TypeDesc::Float)], TypeDesc::Float);
        let m = normalize(&scale, args![2]).unwrap();
        assert!(matches!(&m[0], ArgumentMatcher::Exact(Value::Float(x))
                         if *x == 2.0));
        assert!(m[0].matches(&Value::Float(2.0)));
        let r = normalize(&scale, args!["two"]);
        assert!(matches!(r, Err(Error::TypeMismatch{..})));
        let r = normalize(&publish_winners(), args![1, 2]);
        assert!(matches!(r, Err(Error::TypeMismatch{..})));
    }

    #[test]
    fn normalize_rejects_mixing() {
        let r = normalize(&publish_winners(), args!["first string", any()]);
        assert!(matches!(r, Err(Error::MixedArgumentMode{..})));
        normalize(&publish_winners(), args![eq("first string"), any()])
            .unwrap();
    }

    #[test]
    fn normalize_rejects_wrong_arity() {
        let r = normalize(&publish_winners(), args![any()]);
        assert!(matches!(r, Err(Error::ArityMismatch{expected: 2, actual: 1, ..})));
    }

    #[test]
    fn normalize_rejects_output_on_value_param() {
        let r = normalize(&publish_winners(), args![out_value("x"), any()]);
        assert!(matches!(r, Err(Error::UnsupportedOperation(_))));
    }
}
