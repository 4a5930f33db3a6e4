// vim: tw=80
//! Dynamically typed argument and return values.
//!
//! Every call that crosses a double's interception boundary is flattened
//! into [`Value`]s, so that one controller can serve any interface.

use core::fmt::{self, Display};
use downcast::*;
use std::{cmp::Ordering, sync::Arc};

use crate::{Error, TypeDesc};

/// A type-erased object carried by [`Value::Object`].
///
/// Implemented for every `Debug + Send + Sync + 'static` type.  Use
/// `downcast_ref` to get the concrete type back.
pub trait Opaque: Any + fmt::Debug + Send + Sync {}
downcast!(dyn Opaque);

impl<T: Any + fmt::Debug + Send + Sync> Opaque for T {}

/// A snapshot of one argument or return value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// The value of methods that return nothing
    #[default]
    Unit,
    /// Absence of an object
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// An arbitrary object, compared by identity
    Object(Arc<dyn Opaque>),
}

impl Value {
    /// Wrap an arbitrary object.
    pub fn object<T: Opaque>(t: T) -> Self {
        Value::Object(Arc::new(t))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None
        }
    }

    /// Borrow the concrete type inside an [`Value::Object`].
    pub fn downcast_ref<T: Opaque>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.downcast_ref::<T>().ok(),
            _ => None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short name for this value's variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "()",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    fn mismatch<T>(&self, expected: &TypeDesc) -> Result<T, Error> {
        Err(Error::TypeMismatch {
            expected: expected.to_string(),
            actual: self.kind().to_string()
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            },
            _ => false
        }
    }
}

impl PartialOrd for Value {
    /// Values are only ordered against values of the same variant.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Unit, Value::Unit) => Some(Ordering::Equal),
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::List(a), Value::List(b)) => a.partial_cmp(b),
            _ => None
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            },
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

/// Snapshot a borrowed argument as a [`Value`].
///
/// Generated doubles call this on every argument before interception, so
/// the call history never observes later mutations.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Convert an intercepted return value back into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Error>;
}

/// Describe a Rust type for an [`Interface`](crate::Interface).
pub trait Describe {
    fn describe() -> TypeDesc;
}

macro_rules! int_conversions {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i as i64)
                }
            }

            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, Error> {
                    match value {
                        Value::Int(i) => <$t>::try_from(i).map_err(|_|
                            Error::TypeMismatch {
                                expected: stringify!($t).to_string(),
                                actual: i.to_string()
                            }),
                        v => v.mismatch(&TypeDesc::Int)
                    }
                }
            }

            impl Describe for $t {
                fn describe() -> TypeDesc {
                    TypeDesc::Int
                }
            }
        )*
    }
}

int_conversions!{i8, i16, i32, i64, isize, u8, u16, u32, u64, usize}

macro_rules! float_conversions {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(x: $t) -> Self {
                    Value::Float(x as f64)
                }
            }

            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::Float(*self as f64)
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, Error> {
                    match value.as_float() {
                        Some(x) => Ok(x as $t),
                        None => value.mismatch(&TypeDesc::Float)
                    }
                }
            }

            impl Describe for $t {
                fn describe() -> TypeDesc {
                    TypeDesc::Float
                }
            }
        )*
    }
}

float_conversions!{f32, f64}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            v => v.mismatch(&TypeDesc::Bool)
        }
    }
}

impl Describe for bool {
    fn describe() -> TypeDesc {
        TypeDesc::Bool
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Unit
    }
}

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Unit => Ok(()),
            v => v.mismatch(&TypeDesc::Unit)
        }
    }
}

impl Describe for () {
    fn describe() -> TypeDesc {
        TypeDesc::Unit
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Str(c.to_string())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Describe for char {
    fn describe() -> TypeDesc {
        TypeDesc::Str
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Str(s) => Ok(s),
            v => v.mismatch(&TypeDesc::Str)
        }
    }
}

impl Describe for str {
    fn describe() -> TypeDesc {
        TypeDesc::Str
    }
}

impl Describe for String {
    fn describe() -> TypeDesc {
        TypeDesc::Str
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Value::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::List(l) => l.into_iter().map(T::from_value).collect(),
            v => v.mismatch(&TypeDesc::List(Box::new(TypeDesc::Any)))
        }
    }
}

impl<T: Describe> Describe for [T] {
    fn describe() -> TypeDesc {
        TypeDesc::List(Box::new(T::describe()))
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDesc {
        TypeDesc::List(Box::new(T::describe()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Value::Null, Into::into)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v).map(Some)
        }
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDesc {
        TypeDesc::Optional(Box::new(T::describe()))
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue + ?Sized> ToValue for &mut T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: Describe + ?Sized> Describe for &T {
    fn describe() -> TypeDesc {
        T::describe()
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl Describe for Value {
    fn describe() -> TypeDesc {
        TypeDesc::Any
    }
}
