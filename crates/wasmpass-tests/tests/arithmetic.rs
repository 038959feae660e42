//! Numeric semantics: wrapping arithmetic, trapping division and
//! truncation boundaries.

use wasmpass::{Trap, Value};
use wasmpass_tests::{arith, fib_orig, Call};

#[test]
fn test_add() {
    let m = arith::new().unwrap();
    assert_eq!(m.call_i32("add", &[2.into(), 3.into()]).unwrap(), 5);
    assert_eq!(
        m.call_i32("add", &[i32::MAX.into(), 1.into()]).unwrap(),
        i32::MIN
    );
}

#[test]
fn test_division_matrix() {
    let m = arith::new().unwrap();
    let cases: &[(&str, i32, i32, Result<i32, Trap>)] = &[
        ("div_s", 7, 2, Ok(3)),
        ("div_s", -7, 2, Ok(-3)),
        ("div_s", 1, 0, Err(Trap::DivideByZero)),
        ("div_s", i32::MIN, -1, Err(Trap::IntegerOverflow)),
        ("div_u", -1, 2, Ok(i32::MAX)),
        ("div_u", 1, 0, Err(Trap::DivideByZero)),
        ("rem_s", -7, 2, Ok(-1)),
        ("rem_s", i32::MIN, -1, Ok(0)),
        ("rem_s", 1, 0, Err(Trap::DivideByZero)),
        ("rem_u", -1, 10, Ok(5)),
        ("rem_u", 1, 0, Err(Trap::DivideByZero)),
    ];
    for (name, a, b, expected) in cases {
        assert_eq!(
            m.call_i32(name, &[(*a).into(), (*b).into()]),
            *expected,
            "{name}({a}, {b})"
        );
    }
}

#[test]
fn test_i64_division() {
    let m = arith::new().unwrap();
    assert_eq!(
        m.call_i64("div_s_64", &[i64::MIN.into(), (-1i64).into()]),
        Err(Trap::IntegerOverflow)
    );
    assert_eq!(
        m.call_i64("rem_s_64", &[i64::MIN.into(), (-1i64).into()]),
        Ok(0)
    );
    assert_eq!(
        m.call_i64("div_s_64", &[10i64.into(), 0i64.into()]),
        Err(Trap::DivideByZero)
    );
}

#[test]
fn test_trunc_f32_s_boundaries() {
    let m = arith::new().unwrap();
    let f = |v: f32| m.call_i32("trunc_f32_s", &[v.into()]);
    assert_eq!(f(-2147483648.0), Ok(i32::MIN));
    assert_eq!(f(2147483520.0), Ok(2147483520));
    assert_eq!(f(2147483648.0), Err(Trap::IntegerOverflow));
    assert_eq!(f(-2147483904.0), Err(Trap::IntegerOverflow));
    assert_eq!(f(f32::NAN), Err(Trap::InvalidConversionToInteger));
    assert_eq!(f(-1.9), Ok(-1));
}

#[test]
fn test_trunc_unsigned_boundaries() {
    let m = arith::new().unwrap();
    let f = |v: f32| m.call_i32("trunc_f32_u", &[v.into()]);
    assert_eq!(f(-0.9), Ok(0));
    assert_eq!(f(-1.0), Err(Trap::IntegerOverflow));
    assert_eq!(f(4294967040.0), Ok(4294967040u32 as i32));
    assert_eq!(f(4294967296.0), Err(Trap::IntegerOverflow));

    let g = |v: f64| m.call_i64("trunc_f64_u_64", &[v.into()]);
    assert_eq!(g(18446744073709549568.0), Ok(18446744073709549568u64 as i64));
    assert_eq!(g(18446744073709551616.0), Err(Trap::IntegerOverflow));
    assert_eq!(g(f64::INFINITY), Err(Trap::IntegerOverflow));
}

#[test]
fn test_trunc_f64_s_boundaries() {
    let m = arith::new().unwrap();
    let f = |v: f64| m.call_i32("trunc_f64_s", &[v.into()]);
    assert_eq!(f(2147483647.9), Ok(i32::MAX));
    assert_eq!(f(-2147483648.9), Ok(i32::MIN));
    assert_eq!(f(2147483648.0), Err(Trap::IntegerOverflow));
    assert_eq!(f(-2147483649.0), Err(Trap::IntegerOverflow));
}

#[test]
fn test_saturating_truncation() {
    let m = arith::new().unwrap();
    let f = |v: f32| m.call_i32("trunc_sat_f32_s", &[v.into()]).unwrap();
    assert_eq!(f(f32::NAN), 0);
    assert_eq!(f(1e10), i32::MAX);
    assert_eq!(f(-1e10), i32::MIN);
    let u = |v: f32| m.call_i32("trunc_sat_f32_u", &[v.into()]).unwrap();
    assert_eq!(u(-1.0), 0);
    assert_eq!(u(f32::INFINITY), -1);
    let g = |v: f64| m.call_i64("trunc_sat_f64_u_64", &[v.into()]).unwrap();
    assert_eq!(g(-5.0), 0);
    assert_eq!(g(f64::INFINITY), -1);
}

#[test]
fn test_bit_operations() {
    let m = arith::new().unwrap();
    assert_eq!(m.call_i32("clz", &[0.into()]).unwrap(), 32);
    assert_eq!(m.call_i32("clz", &[1.into()]).unwrap(), 31);
    assert_eq!(m.call_i32("rotl", &[i32::MIN.into(), 33.into()]).unwrap(), 1);
    assert_eq!(
        m.call_i64("shr_u_64", &[(-1i64).into(), 65i64.into()]).unwrap(),
        i64::MAX
    );
    assert_eq!(m.call_i32("extend8", &[0x80.into()]).unwrap(), -128);
    assert_eq!(m.call_i32("wrap", &[0x1_0000_0005i64.into()]).unwrap(), 5);
    assert_eq!(
        m.call_i32("lt_u_64", &[1i64.into(), (-1i64).into()]).unwrap(),
        1
    );
}

#[test]
fn test_float_operations() {
    let m = arith::new().unwrap();
    let min = m.call("min", &[(-0.0f32).into(), 0.0f32.into()]).unwrap();
    assert_eq!(min, vec![Value::F32(-0.0)]);
    let min_nan = m.call("min", &[f32::NAN.into(), 1.0f32.into()]).unwrap();
    assert!(min_nan[0].as_f32().is_some_and(f32::is_nan));
    assert_eq!(
        m.call("nearest", &[2.5f64.into()]).unwrap(),
        vec![Value::F64(2.0)]
    );
    assert_eq!(
        m.call("nearest", &[(-0.4f64).into()]).unwrap(),
        vec![Value::F64(-0.0)]
    );
    assert_eq!(
        m.call("convert_u", &[(-1).into()]).unwrap(),
        vec![Value::F64(4294967295.0)]
    );
}

#[test]
fn test_fib_matches_native() {
    let m = arith::new().unwrap();
    for n in [0, 1, 2, 10, 30] {
        assert_eq!(m.call_i32("fib", &[n.into()]).unwrap(), fib_orig(n), "fib({n})");
    }
}

#[test]
fn test_recursive_factorial() {
    let m = arith::new().unwrap();
    assert_eq!(m.call_i64("fac", &[0i64.into()]).unwrap(), 1);
    assert_eq!(m.call_i64("fac", &[20i64.into()]).unwrap(), 2432902008176640000);
}
