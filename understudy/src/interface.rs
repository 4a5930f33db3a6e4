// vim: tw=80
//! Descriptions of the interfaces that doubles stand in for.

use core::fmt::{self, Display};
use std::sync::Arc;

use crate::{Error, Value};

/// The type of a parameter or return value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TypeDesc {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    List(Box<TypeDesc>),
    Optional(Box<TypeDesc>),
    /// Any other object type, by name
    Object(String),
    /// Accepts every [`Value`]
    Any,
}

impl TypeDesc {
    /// The value returned by calls that no expectation answers.
    pub fn zero_value(&self) -> Value {
        match self {
            TypeDesc::Unit => Value::Unit,
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Int => Value::Int(0),
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::Str => Value::Str(String::new()),
            TypeDesc::List(_) => Value::List(Vec::new()),
            TypeDesc::Optional(_) | TypeDesc::Object(_) | TypeDesc::Any =>
                Value::Null,
        }
    }

    /// Can `value` be returned from a member of this type?
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeDesc::Any, _) => true,
            (TypeDesc::Unit, Value::Unit) => true,
            (TypeDesc::Bool, Value::Bool(_)) => true,
            (TypeDesc::Int, Value::Int(_)) => true,
            (TypeDesc::Float, Value::Float(_) | Value::Int(_)) => true,
            (TypeDesc::Str, Value::Str(_)) => true,
            (TypeDesc::List(t), Value::List(l)) => l.iter().all(|v| t.admits(v)),
            (TypeDesc::Optional(_), Value::Null) => true,
            (TypeDesc::Optional(t), v) => t.admits(v),
            (TypeDesc::Object(_), Value::Object(_) | Value::Null) => true,
            _ => false
        }
    }

    /// Convert `value` to this type's representation.
    ///
    /// Integers widen to floats, including inside lists and optionals.  Values
    /// this type doesn't [`admit`](Self::admits) are a
    /// [`Error::TypeMismatch`].
    pub fn coerce(&self, value: Value) -> Result<Value, Error> {
        match (self, value) {
            (TypeDesc::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (TypeDesc::List(t), Value::List(l)) => l.into_iter()
                .map(|v| t.coerce(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (TypeDesc::Optional(_), Value::Null) => Ok(Value::Null),
            (TypeDesc::Optional(t), v) => t.coerce(v),
            (t, v) if t.admits(&v) => Ok(v),
            (t, v) => Err(Error::TypeMismatch {
                expected: t.to_string(),
                actual: v.kind().to_owned()
            })
        }
    }
}

impl Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeDesc::Unit => f.write_str("()"),
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Int => f.write_str("int"),
            TypeDesc::Float => f.write_str("float"),
            TypeDesc::Str => f.write_str("string"),
            TypeDesc::List(t) => write!(f, "[{}]", t),
            TypeDesc::Optional(t) => write!(f, "{}?", t),
            TypeDesc::Object(name) => f.write_str(name),
            TypeDesc::Any => f.write_str("any"),
        }
    }
}

/// How a parameter is passed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Passing {
    /// By value or shared reference; the double cannot change it
    Value,
    /// In/out.  Expectations may rewrite it with
    /// [`ref_match`](crate::matcher::ref_match).
    Ref,
    /// Output only.  Expectations may set it with
    /// [`out_value`](crate::matcher::out_value).
    Out,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeDesc,
    pub passing: Passing,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Param{name: name.into(), ty, passing: Passing::Value}
    }

    pub fn by_ref(name: impl Into<String>, ty: TypeDesc) -> Self {
        Param{name: name.into(), ty, passing: Passing::Ref}
    }

    pub fn out(name: impl Into<String>, ty: TypeDesc) -> Self {
        Param{name: name.into(), ty, passing: Passing::Out}
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MemberKind {
    Method,
    /// Reads a property
    Getter,
    /// Writes a property.  Its single parameter is the new value.
    Setter,
    /// An event that handlers can be attached to
    Event,
}

/// Identifies one member of an interface.
///
/// Getters and setters share the name of their property.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MethodSignature {
    name: String,
    kind: MemberKind,
    params: Vec<Param>,
    ret: TypeDesc,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>,
               kind: MemberKind,
               params: Vec<Param>,
               ret: TypeDesc) -> Self
    {
        MethodSignature{name: name.into(), kind, params, ret}
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn ret(&self) -> &TypeDesc {
        &self.ret
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, MemberKind::Getter | MemberKind::Setter)
    }
}

impl Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            MemberKind::Getter => write!(f, "get {}", self.name),
            MemberKind::Setter => write!(f, "set {}", self.name),
            MemberKind::Event => write!(f, "event {}", self.name),
            MemberKind::Method => {
                write!(f, "{}(", self.name)?;
                for (i, p) in self.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match p.passing {
                        Passing::Value => (),
                        Passing::Ref => f.write_str("ref ")?,
                        Passing::Out => f.write_str("out ")?,
                    }
                    write!(f, "{}: {}", p.name, p.ty)?;
                }
                write!(f, ")")?;
                if self.ret != TypeDesc::Unit {
                    write!(f, " -> {}", self.ret)?;
                }
                Ok(())
            }
        }
    }
}

/// The member set of an interface.
///
/// Usually built by the `#[double]` attribute, but it can be assembled by
/// hand with [`Interface::builder`].
#[derive(Clone, Debug)]
pub struct Interface {
    name: String,
    members: Vec<Arc<MethodSignature>>,
}

impl Interface {
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder{name: name.into(), members: Vec::new()}
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All members, in declaration order
    pub fn members(&self) -> &[Arc<MethodSignature>] {
        &self.members
    }

    fn lookup(&self, name: &str, kind: MemberKind)
        -> Result<Arc<MethodSignature>, Error>
    {
        self.members.iter()
            .find(|m| m.kind == kind && m.name == name)
            .cloned()
            .ok_or_else(|| Error::UnknownMember {
                interface: self.name.clone(),
                member: name.to_owned()
            })
    }

    pub fn method(&self, name: &str) -> Result<Arc<MethodSignature>, Error> {
        self.lookup(name, MemberKind::Method)
    }

    pub fn getter(&self, property: &str)
        -> Result<Arc<MethodSignature>, Error>
    {
        self.lookup(property, MemberKind::Getter)
    }

    pub fn setter(&self, property: &str)
        -> Result<Arc<MethodSignature>, Error>
    {
        self.lookup(property, MemberKind::Setter)
    }

    pub fn event(&self, name: &str) -> Result<Arc<MethodSignature>, Error> {
        self.lookup(name, MemberKind::Event)
    }

    /// Does the property have a setter?
    pub fn is_settable(&self, property: &str) -> bool {
        self.members.iter()
            .any(|m| m.kind == MemberKind::Setter && m.name == property)
    }

    /// Find the interface's own copy of `signature`.
    pub(crate) fn resolve(&self, signature: &MethodSignature)
        -> Result<Arc<MethodSignature>, Error>
    {
        self.members.iter()
            .find(|m| m.as_ref() == signature)
            .cloned()
            .ok_or_else(|| Error::UnknownMember {
                interface: self.name.clone(),
                member: signature.to_string()
            })
    }
}

pub struct InterfaceBuilder {
    name: String,
    members: Vec<Arc<MethodSignature>>,
}

impl InterfaceBuilder {
    fn member(mut self, signature: MethodSignature) -> Self {
        self.members.push(Arc::new(signature));
        self
    }

    pub fn method(self,
                  name: impl Into<String>,
                  params: Vec<Param>,
                  ret: TypeDesc) -> Self
    {
        self.member(MethodSignature::new(name, MemberKind::Method, params, ret))
    }

    pub fn getter(self, property: impl Into<String>, ty: TypeDesc) -> Self {
        let sig = MethodSignature::new(property, MemberKind::Getter,
                                       Vec::new(), ty);
        self.member(sig)
    }

    pub fn setter(self, property: impl Into<String>, ty: TypeDesc) -> Self {
        let params = vec![Param::new("value", ty)];
        let sig = MethodSignature::new(property, MemberKind::Setter, params,
                                       TypeDesc::Unit);
        self.member(sig)
    }

    /// Shorthand for a getter and a setter of the same property
    pub fn property(self, property: impl Into<String>, ty: TypeDesc) -> Self
    {
        let property = property.into();
        self.getter(property.clone(), ty.clone())
            .setter(property, ty)
    }

    pub fn event(self, name: impl Into<String>) -> Self {
        let sig = MethodSignature::new(name, MemberKind::Event, Vec::new(),
                                       TypeDesc::Unit);
        self.member(sig)
    }

    pub fn build(self) -> Interface {
        Interface{name: self.name, members: self.members}
    }
}
