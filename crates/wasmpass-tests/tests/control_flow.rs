//! Blocks, loops, branches and their value transfer.

use wasmpass::{Trap, Value};
use wasmpass_tests::{control, Call};

#[test]
fn test_loop_sum() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("sum_to", &[0.into()]).unwrap(), 0);
    assert_eq!(m.call_i32("sum_to", &[100.into()]).unwrap(), 5050);
}

#[test]
fn test_branch_discards_excess_values() {
    let m = control::new().unwrap();
    // a + 3b: the branch keeps 3b and drops the `a` below it
    assert_eq!(m.call_i32("block_params", &[10.into(), 2.into()]).unwrap(), 16);
}

#[test]
fn test_branch_past_three_extra_values() {
    let m = control::new().unwrap();
    // a + 7b
    assert_eq!(m.call("three_extras", &[1.into(), 2.into()]).unwrap(), vec![Value::I32(15)]);
}

#[test]
fn test_br_if_out_of_two_scopes_with_wide_excess() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i64("nested_excess", &[1.into()]).unwrap(), 1042);
    assert_eq!(m.call_i64("nested_excess", &[0.into()]).unwrap(), 1007);
}

#[test]
fn test_br_table_to_multi_value_targets() {
    let m = control::new().unwrap();
    assert_eq!(
        m.call("pick_pair", &[0.into()]).unwrap(),
        vec![Value::I32(1), Value::I64(12)]
    );
    for index in [1, 5] {
        assert_eq!(
            m.call("pick_pair", &[index.into()]).unwrap(),
            vec![Value::I32(1), Value::I64(2)],
            "pick_pair({index})"
        );
    }
}

#[test]
fn test_loop_back_edge_drops_excess() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("loop_excess", &[3.into()]).unwrap(), 48);
    assert_eq!(m.call_i32("loop_excess", &[0.into()]).unwrap(), 0);
}

#[test]
fn test_loop_with_params() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("countdown", &[5.into()]).unwrap(), 0);
}

#[test]
fn test_br_table() {
    let m = control::new().unwrap();
    for (index, expected) in [(0, 100), (1, 101), (2, 102), (3, 999), (-1, 999)] {
        assert_eq!(
            m.call_i32("switch", &[index.into()]).unwrap(),
            expected,
            "switch({index})"
        );
    }
}

#[test]
fn test_br_table_carries_values() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("switch_value", &[0.into()]).unwrap(), 11);
    assert_eq!(m.call_i32("switch_value", &[1.into()]).unwrap(), 10);
    assert_eq!(m.call_i32("switch_value", &[7.into()]).unwrap(), 10);
}

#[test]
fn test_select() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("max", &[3.into(), 9.into()]).unwrap(), 9);
    assert_eq!(m.call_i32("max", &[(-3).into(), (-9).into()]).unwrap(), -3);
}

#[test]
fn test_nested_if_else() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("sign", &[(-5).into()]).unwrap(), -1);
    assert_eq!(m.call_i32("sign", &[0.into()]).unwrap(), 0);
    assert_eq!(m.call_i32("sign", &[5.into()]).unwrap(), 1);
}

#[test]
fn test_if_without_else_passes_params_through() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("inc_if", &[4.into(), 1.into()]).unwrap(), 5);
    assert_eq!(m.call_i32("inc_if", &[4.into(), 0.into()]).unwrap(), 4);
}

#[test]
fn test_early_return() {
    let m = control::new().unwrap();
    assert_eq!(m.call_i32("early", &[0.into()]).unwrap(), 5);
    assert_eq!(m.call_i32("early", &[1.into()]).unwrap(), 6);
}

#[test]
fn test_unreachable_traps() {
    let m = control::new().unwrap();
    assert_eq!(m.call("trap", &[]), Err(Trap::Unreachable));
    assert_eq!(m.call("trap_after_value", &[]), Err(Trap::Unreachable));
}
