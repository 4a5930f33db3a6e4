// vim: tw=80
//! The record of every call a double received.

use std::sync::Arc;

use crate::{MethodSignature, Value, matcher::{self, ArgumentMatcher}};

/// Distinguishes interactions from plain property state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordKind {
    /// An interaction, visible to verification
    Call,
    /// A property accessor served by the backing store.  Such accesses are
    /// state, not interactions, so verification ignores them.
    StateAccess,
}

/// One intercepted call.  Immutable once recorded.
#[derive(Clone, Debug)]
pub struct InvocationRecord {
    signature: Arc<MethodSignature>,
    args: Vec<Value>,
    seq: usize,
    kind: RecordKind,
}

impl InvocationRecord {
    pub fn signature(&self) -> &Arc<MethodSignature> {
        &self.signature
    }

    /// The arguments as they were when the call arrived
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Position of this call within its double's history, starting at 0
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Is this an interaction with `signature` whose arguments satisfy
    /// `matchers`?
    pub fn matches(&self,
                   signature: &MethodSignature,
                   matchers: &[ArgumentMatcher]) -> bool
    {
        self.is_call_to(signature) && matcher::all_match(matchers, &self.args)
    }

    pub(crate) fn is_call_to(&self, signature: &MethodSignature) -> bool {
        self.kind == RecordKind::Call && self.signature.as_ref() == signature
    }
}

/// An append-only sequence of [`InvocationRecord`]s.
#[derive(Debug, Default)]
pub struct CallHistory {
    records: Vec<InvocationRecord>,
}

impl CallHistory {
    /// Record a call and return its sequence number.
    pub fn append(&mut self,
                  signature: Arc<MethodSignature>,
                  args: Vec<Value>,
                  kind: RecordKind) -> usize
    {
        let seq = self.records.len();
        self.records.push(InvocationRecord{signature, args, seq, kind});
        seq
    }

    pub fn records(&self) -> &[InvocationRecord] {
        &self.records
    }

    /// Interactions with `signature`, in call order
    pub fn calls_to<'a>(&'a self, signature: &'a MethodSignature)
        -> impl Iterator<Item=&'a InvocationRecord> + 'a
    {
        self.records.iter().filter(move |r| r.is_call_to(signature))
    }

    pub fn count_matching(&self,
                          signature: &MethodSignature,
                          matchers: &[ArgumentMatcher]) -> usize
    {
        self.records.iter()
            .filter(|r| r.matches(signature, matchers))
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{MemberKind, Param, TypeDesc, matcher::{any, eq}};

    fn sig(name: &str) -> Arc<MethodSignature> {
        Arc::new(MethodSignature::new(name, MemberKind::Method,
            vec![Param::new("s", TypeDesc::Str)], TypeDesc::Int))
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut h = CallHistory::default();
        assert_eq!(0, h.append(sig("f"), vec!["a".into()], RecordKind::Call));
        assert_eq!(1, h.append(sig("g"), vec!["b".into()], RecordKind::Call));
        assert_eq!(vec![0, 1],
                   h.records().iter().map(|r| r.seq()).collect::<Vec<_>>());
    }

    #[test]
    fn count_matching_ignores_state_accesses() {
        let f = sig("f");
        let mut h = CallHistory::default();
        h.append(f.clone(), vec!["foo".into()], RecordKind::Call);
        h.append(f.clone(), vec!["bar".into()], RecordKind::Call);
        h.append(f.clone(), vec!["foo".into()], RecordKind::StateAccess);
        h.append(sig("g"), vec!["foo".into()], RecordKind::Call);
        assert_eq!(2, h.count_matching(&f, &[any()]));
        assert_eq!(1, h.count_matching(&f, &[eq("foo")]));
        assert_eq!(2, h.calls_to(&f).count());
        assert_eq!(4, h.len());
    }
}
