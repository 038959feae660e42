//! Exported globals and the start function.

use wasmpass::Value;
use wasmpass_tests::{globals, Call};

#[test]
fn test_start_function_runs_on_instantiation() {
    let m = globals::new().unwrap();
    assert_eq!(m.global("counter").unwrap().get(), Value::I32(10));
}

#[test]
fn test_exported_global_is_live() {
    let m = globals::new().unwrap();
    let counter = m.global("counter").unwrap();
    assert_eq!(m.call_i32("bump", &[]), Ok(11));
    assert_eq!(counter.get(), Value::I32(11));
    assert!(counter.set(Value::I32(100)));
    assert_eq!(m.call_i32("bump", &[]), Ok(101));
}

#[test]
fn test_global_set_checks() {
    let m = globals::new().unwrap();
    let limit = m.global("limit").unwrap();
    assert_eq!(limit.get(), Value::I64(42));
    assert!(!limit.set(Value::I64(1)));
    assert_eq!(limit.get(), Value::I64(42));
    let counter = m.global("counter").unwrap();
    assert!(!counter.set(Value::I64(1)));
}

#[test]
fn test_instances_have_separate_globals() {
    let module = globals::compile().unwrap();
    let a = module.instantiate(&wasmpass::Imports::new()).unwrap();
    let b = module.instantiate(&wasmpass::Imports::new()).unwrap();
    a.call("bump", &[]).unwrap();
    a.call("bump", &[]).unwrap();
    assert_eq!(b.call_i32("bump", &[]), Ok(11));
}
