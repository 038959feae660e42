//! Fixture modules and call helpers for the wasmpass execution tests.
//!
//! Each fixture under `data/wat/` gets a module here with its source text
//! and a `new()` that compiles and instantiates it:
//!
//! ```ignore
//! let m = arith::new().unwrap();
//! assert_eq!(m.call_i32("add", &[2.into(), 3.into()]).unwrap(), 5);
//! ```

use anyhow::{Context, Result};
use wasmpass::{compile, CompileOptions, CompiledModule, Imports, Instance, InvokeError, Trap, Value};

macro_rules! fixture {
    ($name:ident, $file:literal) => {
        pub mod $name {
            pub const WAT: &str =
                include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/wat/", $file));

            pub fn compile() -> anyhow::Result<wasmpass::CompiledModule> {
                crate::compile_wat(WAT)
            }

            pub fn new() -> anyhow::Result<wasmpass::Instance> {
                crate::instantiate(WAT, &wasmpass::Imports::new())
            }

            pub fn with_imports(imports: &wasmpass::Imports) -> anyhow::Result<wasmpass::Instance> {
                crate::instantiate(WAT, imports)
            }
        }
    };
}

fixture!(arith, "arith.wat");
fixture!(control, "control.wat");
fixture!(memory, "memory.wat");
fixture!(indirect, "indirect.wat");
fixture!(imports, "imports.wat");
fixture!(multi_value, "multi_value.wat");
fixture!(bulk, "bulk.wat");
fixture!(globals, "globals.wat");

pub fn compile_wat(source: &str) -> Result<CompiledModule> {
    let bytes = wat::parse_str(source).context("failed to parse WAT")?;
    Ok(compile(&bytes, &CompileOptions::default())?)
}

pub fn instantiate(source: &str, imports: &Imports) -> Result<Instance> {
    let module = compile_wat(source)?;
    Ok(module.instantiate(imports)?)
}

/// Shorthand calls for tests. Argument errors panic; traps are returned.
pub trait Call {
    fn call(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, Trap>;

    fn call_i32(&self, name: &str, args: &[Value]) -> Result<i32, Trap> {
        let results = self.call(name, args)?;
        match results.as_slice() {
            [Value::I32(v)] => Ok(*v),
            other => panic!("{name}: expected one i32 result, got {other:?}"),
        }
    }

    fn call_i64(&self, name: &str, args: &[Value]) -> Result<i64, Trap> {
        let results = self.call(name, args)?;
        match results.as_slice() {
            [Value::I64(v)] => Ok(*v),
            other => panic!("{name}: expected one i64 result, got {other:?}"),
        }
    }
}

impl Call for Instance {
    fn call(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, Trap> {
        match self.invoke(name, args) {
            Ok(results) => Ok(results),
            Err(InvokeError::Trap(trap)) => Err(trap),
            Err(err) => panic!("{name}: {err}"),
        }
    }
}

pub fn fib_orig(n: i32) -> i32 {
    if n <= 1 {
        n
    } else {
        let mut a: i32 = 0;
        let mut b: i32 = 1;
        for _ in 2..=n {
            let tmp = a.wrapping_add(b);
            a = b;
            b = tmp;
        }
        b
    }
}
