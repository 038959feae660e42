//! call_indirect dispatch, its traps, and call depth.

use wasmpass::{InstanceConfig, Trap};
use wasmpass_tests::{indirect, Call};

#[test]
fn test_binop_dispatch() {
    let m = indirect::new().unwrap();
    assert_eq!(m.call_i32("dispatch_binop", &[10.into(), 3.into(), 0.into()]), Ok(13));
    assert_eq!(m.call_i32("dispatch_binop", &[10.into(), 3.into(), 1.into()]), Ok(7));
    assert_eq!(m.call_i32("dispatch_binop", &[10.into(), 3.into(), 2.into()]), Ok(30));
}

#[test]
fn test_direct_and_indirect_agree() {
    let m = indirect::new().unwrap();
    for (a, b) in [(1, 2), (100, 50), (-5, 3), (i32::MAX, 1)] {
        assert_eq!(
            m.call_i32("add", &[a.into(), b.into()]),
            m.call_i32("dispatch_binop", &[a.into(), b.into(), 0.into()]),
            "add({a}, {b})"
        );
    }
}

#[test]
fn test_unop_dispatch() {
    let m = indirect::new().unwrap();
    assert_eq!(m.call_i32("dispatch_unop", &[42.into(), 3.into()]), Ok(-42));
}

#[test]
fn test_signature_mismatch_traps() {
    let m = indirect::new().unwrap();
    assert_eq!(
        m.call_i32("dispatch_binop", &[1.into(), 2.into(), 3.into()]),
        Err(Trap::IndirectCallTypeMismatch)
    );
    assert_eq!(
        m.call_i32("dispatch_unop", &[1.into(), 0.into()]),
        Err(Trap::IndirectCallTypeMismatch)
    );
}

#[test]
fn test_null_slot_traps() {
    let m = indirect::new().unwrap();
    assert_eq!(
        m.call_i32("dispatch_binop", &[1.into(), 2.into(), 4.into()]),
        Err(Trap::UninitializedElement)
    );
}

#[test]
fn test_index_past_table_traps() {
    let m = indirect::new().unwrap();
    for index in [5, 1000, -1] {
        assert_eq!(
            m.call_i32("dispatch_binop", &[1.into(), 2.into(), index.into()]),
            Err(Trap::TableOutOfBounds),
            "index {index}"
        );
    }
}

#[test]
fn test_unbounded_recursion_exhausts_call_stack() {
    let m = indirect::new().unwrap();
    assert_eq!(m.call("recurse", &[0.into()]), Err(Trap::CallStackExhausted));
}

#[test]
fn test_call_depth_is_configurable() {
    let module = indirect::compile().unwrap();
    let config = InstanceConfig { max_call_depth: 4 };
    let m = module
        .instantiate_with(&wasmpass::Imports::new(), &config)
        .unwrap();
    assert_eq!(m.call("recurse", &[0.into()]), Err(Trap::CallStackExhausted));
    // shallow calls still fit
    assert_eq!(m.call_i32("add", &[1.into(), 1.into()]), Ok(2));
}
