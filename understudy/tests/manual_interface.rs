// vim: tw=80
//! Doubles built from a hand-written interface description, without
//! #[double]

use understudy::*;
use understudy::matcher::*;

fn sample() -> Interface {
    Interface::builder("SampleInterface")
        .property("property", TypeDesc::Optional(Box::new(TypeDesc::Str)))
        .method("void_method", vec![], TypeDesc::Unit)
        .method("method_that_returns_integer",
                vec![Param::new("s", TypeDesc::Str)],
                TypeDesc::Int)
        .method("method_that_returns_object",
                vec![Param::new("i", TypeDesc::Int)],
                TypeDesc::Object("SampleClass".to_owned()))
        .method("scale", vec![Param::new("factor", TypeDesc::Float)],
                TypeDesc::Float)
        .build()
}

#[derive(Debug)]
struct SampleClass(u32);

#[test]
fn get_number_scenario() {
    let mock = create_mock(sample());
    let sig = mock.interface().method("method_that_returns_integer").unwrap();
    mock.configure_return(&sig, args![any()], 5).unwrap().times(1).unwrap();
    let first = mock.intercept(&sig, vec!["x".into()]).unwrap();
    assert_eq!(5, first.returned::<i32>().unwrap());
    let second = mock.intercept(&sig, vec!["x".into()]).unwrap();
    assert_eq!(0, second.returned::<i32>().unwrap());
    mock.assert_was_called_times(&sig, args![any()], Constraint::Exactly(2))
        .unwrap();
}

#[test]
fn mock_properties_are_null() {
    let mock = create_mock(sample());
    let set = mock.interface().setter("property").unwrap();
    let get = mock.interface().getter("property").unwrap();
    mock.intercept(&set, vec!["my string".into()]).unwrap();
    let v = mock.intercept(&get, vec![]).unwrap().value;
    assert!(v.is_null());
}

#[test]
fn stub_properties_are_settable() {
    let stub = create_stub(sample());
    let set = stub.interface().setter("property").unwrap();
    let get = stub.interface().getter("property").unwrap();
    stub.intercept(&set, vec!["my string".into()]).unwrap();
    let v = stub.intercept(&get, vec![]).unwrap();
    assert_eq!(Some("my string".to_owned()),
               v.returned::<Option<String>>().unwrap());
}

#[test]
fn objects() {
    let stub = create_stub(sample());
    let sig = stub.interface().method("method_that_returns_object").unwrap();
    assert!(stub.intercept(&sig, vec![Value::Int(1)]).unwrap().value.is_null());
    let obj = Value::object(SampleClass(42));
    stub.configure_return(&sig, args![2], obj.clone()).unwrap();
    let v = stub.intercept(&sig, vec![Value::Int(2)]).unwrap().value;
    assert_eq!(obj, v);
    assert_eq!(42, v.downcast_ref::<SampleClass>().unwrap().0);
}

#[test]
fn wrong_return_type() {
    let stub = create_stub(sample());
    let sig = stub.interface().method("method_that_returns_integer").unwrap();
    stub.configure_return(&sig, args![any()], 5).unwrap();
    let o = stub.intercept(&sig, vec!["x".into()]).unwrap();
    assert!(matches!(o.returned::<String>(), Err(Error::TypeMismatch{..})));
}

#[test]
fn history_keeps_every_call() {
    let mock = create_mock(sample());
    let void = mock.interface().method("void_method").unwrap();
    let int = mock.interface().method("method_that_returns_integer").unwrap();
    mock.intercept(&void, vec![]).unwrap();
    mock.intercept(&int, vec!["foo".into()]).unwrap();
    let history = mock.history().unwrap();
    let seen = history.iter()
        .map(|r| (r.seq(), r.signature().name().to_owned(), r.kind()))
        .collect::<Vec<_>>();
    assert_eq!(vec![
        (0, "void_method".to_owned(), RecordKind::Call),
        (1, "method_that_returns_integer".to_owned(), RecordKind::Call)
    ], seen);
}

#[test]
fn integer_literals_match_float_parameters() {
    let stub = create_stub(sample());
    let sig = stub.interface().method("scale").unwrap();
    stub.configure_return(&sig, args![2], 9).unwrap();
    let o = stub.intercept(&sig, vec![Value::Float(2.0)]).unwrap();
    assert_eq!(Value::Float(9.0), o.value);
    assert_eq!(9.0, o.returned::<f64>().unwrap());
    stub.assert_was_called(&sig, args![2]).unwrap();
    let r = stub.configure_return(&sig, args!["two"], 1.0);
    assert!(matches!(r, Err(Error::TypeMismatch{..})));
}
