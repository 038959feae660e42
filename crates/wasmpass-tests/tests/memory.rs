//! Linear memory: bounds, offsets, narrow accesses and growth.

use wasmpass::{compile, CompileOptions, Imports, Trap, Value};
use wasmpass_tests::{memory, Call};

const PAGE: i32 = 65536;

#[test]
fn test_data_segment_applied() {
    let m = memory::new().unwrap();
    assert_eq!(m.call_i32("load", &[16.into()]).unwrap(), 0x0403_0201);
    assert_eq!(m.call_i32("load_offset", &[12.into()]).unwrap(), 0x0403_0201);
}

#[test]
fn test_store_visible_to_host() {
    let m = memory::new().unwrap();
    m.call("store", &[100.into(), 42.into()]).unwrap();
    let mem = m.memory("mem").unwrap();
    assert_eq!(mem.borrow().load_i32(100).unwrap(), 42);
}

#[test]
fn test_bounds_at_end_of_memory() {
    let m = memory::new().unwrap();
    assert_eq!(m.call_i32("load", &[(PAGE - 4).into()]), Ok(0));
    assert_eq!(m.call_i32("load", &[(PAGE - 3).into()]), Err(Trap::OutOfBounds));
    assert_eq!(m.call_i32("load", &[(-4).into()]), Err(Trap::OutOfBounds));
    assert!(m.call("store", &[(PAGE - 4).into(), 1.into()]).is_ok());
    assert_eq!(
        m.call("store", &[(PAGE - 3).into(), 1.into()]),
        Err(Trap::OutOfBounds)
    );
}

#[test]
fn test_offset_does_not_wrap() {
    let m = memory::new().unwrap();
    assert_eq!(m.call_i32("load_far", &[0.into()]), Err(Trap::OutOfBounds));
    assert_eq!(m.call_i32("load_far", &[1.into()]), Err(Trap::OutOfBounds));
    assert_eq!(
        m.call_i32("load_offset", &[(PAGE - 7).into()]),
        Err(Trap::OutOfBounds)
    );
}

#[test]
fn test_narrow_loads() {
    let m = memory::new().unwrap();
    assert_eq!(m.call_i32("load8_s", &[20.into()]).unwrap(), -1);
    assert_eq!(m.call_i32("load8_u", &[20.into()]).unwrap(), 255);
    assert_eq!(m.call_i64("load16_u_64", &[16.into()]).unwrap(), 0x0201);
    assert_eq!(m.call_i64("load32_s_64", &[17.into()]).unwrap(), -16514302);
}

#[test]
fn test_narrow_store_writes_one_byte() {
    let m = memory::new().unwrap();
    m.call("store8", &[16.into(), 0x1234.into()]).unwrap();
    assert_eq!(m.call_i32("load", &[16.into()]).unwrap(), 0x0403_0234);
}

#[test]
fn test_f64_roundtrip() {
    let m = memory::new().unwrap();
    m.call("store_f64", &[32.into(), 1.25f64.into()]).unwrap();
    assert_eq!(
        m.call("load_f64", &[32.into()]).unwrap(),
        vec![Value::F64(1.25)]
    );
}

#[test]
fn test_grow() {
    let m = memory::new().unwrap();
    assert_eq!(m.call_i32("size", &[]).unwrap(), 1);
    assert_eq!(m.call_i32("grow", &[1.into()]).unwrap(), 1);
    assert_eq!(m.call_i32("size", &[]).unwrap(), 2);
    // new page is zeroed and addressable
    assert_eq!(m.call_i32("load", &[(2 * PAGE - 4).into()]), Ok(0));
    // beyond the declared maximum of 3
    assert_eq!(m.call_i32("grow", &[2.into()]).unwrap(), -1);
    assert_eq!(m.call_i32("grow", &[0.into()]).unwrap(), 2);
    assert_eq!(m.call_i32("grow", &[1.into()]).unwrap(), 2);
    assert_eq!(m.call_i32("size", &[]).unwrap(), 3);
}

#[test]
fn test_instances_do_not_share_memory() {
    let a = memory::new().unwrap();
    let b = memory::new().unwrap();
    a.call("store", &[0.into(), 7.into()]).unwrap();
    assert_eq!(b.call_i32("load", &[0.into()]).unwrap(), 0);
}

#[test]
fn test_grow_stops_at_configured_page_cap() {
    // no declared maximum, so only the compile-time cap bounds growth
    let bytes = wat::parse_str(
        r#"(module
            (memory 1)
            (func (export "grow") (param i32) (result i32) local.get 0 memory.grow))"#,
    )
    .unwrap();
    let options = CompileOptions {
        max_memory_pages: 2,
        ..CompileOptions::default()
    };
    let m = compile(&bytes, &options)
        .unwrap()
        .instantiate(&Imports::new())
        .unwrap();
    assert_eq!(m.call_i32("grow", &[65535.into()]).unwrap(), -1);
    assert_eq!(m.call_i32("grow", &[2.into()]).unwrap(), -1);
    assert_eq!(m.call_i32("grow", &[1.into()]).unwrap(), 1);
    assert_eq!(m.call_i32("grow", &[1.into()]).unwrap(), -1);
}
