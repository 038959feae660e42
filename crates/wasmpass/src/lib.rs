//! wasmpass: single-pass WebAssembly decoder, validator and translator.
//!
//! The pipeline reads a module binary once: sections are decoded in file
//! order, index spaces are populated in the type registry, and every code
//! body is validated and translated as soon as it is read. Translation emits
//! target operations directly through the [`backend::CodeEmitter`] trait;
//! the bundled [`backend::VmEmitter`] produces bytecode for the interpreter
//! behind [`Instance`].
//!
//! ```no_run
//! use wasmpass::{compile, CompileOptions, Imports, Value};
//!
//! let bytes = std::fs::read("add.wasm").unwrap();
//! let module = compile(&bytes, &CompileOptions::default()).unwrap();
//! let instance = module.instantiate(&Imports::new()).unwrap();
//! let sum = instance.invoke("add", &[Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(sum, vec![Value::I32(5)]);
//! ```

pub mod assembler;
pub mod backend;
pub mod error;
mod exec;
pub mod instance;
pub mod parser;
pub mod translate;
pub mod types;

use std::sync::Arc;

use assembler::{AssembledModule, DataSegment, ElementSegment, Export, Import};
use backend::vm::CompiledFunction;
use backend::VmEmitter;
use translate::MemoryAccessors;
use types::TypeRegistry;

pub use error::{CompileError, CompileErrorKind, InstantiationError, InvokeError};
pub use instance::{
    Extern, Func, Global, Imports, Instance, InstanceConfig, Memory, Ref, Table, Value,
};
pub use wasmpass_runtime::Trap;

/// Compilation settings.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Declared memory limits above this many pages are rejected, and
    /// defined memories never grow past it.
    pub max_memory_pages: u32,
    /// Serve loads/stores with a static offset or a non-zero memory index
    /// through memoized per-module accessors.
    pub memory_accessors: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_memory_pages: wasmpass_runtime::MAX_PAGES,
            memory_accessors: true,
        }
    }
}

/// Decode, validate and translate a WebAssembly binary.
pub fn compile(bytes: &[u8], options: &CompileOptions) -> Result<CompiledModule, CompileError> {
    let mut emitter = VmEmitter::new();
    let assembled = assembler::assemble(bytes, options, &mut emitter)?;
    Ok(CompiledModule {
        inner: Arc::new(assembled),
    })
}

/// A validated, translated module. Cheap to clone; can be instantiated any
/// number of times, from any thread.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    inner: Arc<AssembledModule<CompiledFunction>>,
}

impl CompiledModule {
    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn imports(&self) -> &[Import] {
        &self.inner.imports
    }

    pub fn exports(&self) -> &[Export] {
        &self.inner.exports
    }

    /// Compiled bodies of the defined functions.
    pub fn functions(&self) -> &[CompiledFunction] {
        &self.inner.functions
    }

    pub fn accessors(&self) -> &MemoryAccessors {
        &self.inner.accessors
    }

    pub fn start(&self) -> Option<u32> {
        self.inner.start
    }

    pub(crate) fn assembled(&self) -> &AssembledModule<CompiledFunction> {
        &self.inner
    }

    pub(crate) fn elements(&self) -> &[ElementSegment] {
        &self.inner.elements
    }

    pub(crate) fn data(&self) -> &[DataSegment] {
        &self.inner.data
    }

    pub fn instantiate(&self, imports: &Imports) -> Result<Instance, InstantiationError> {
        self.instantiate_with(imports, &InstanceConfig::default())
    }

    pub fn instantiate_with(
        &self,
        imports: &Imports,
        config: &InstanceConfig,
    ) -> Result<Instance, InstantiationError> {
        Instance::new(self, imports, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn compiled_module_is_shareable() {
        assert_send_sync::<CompiledModule>();
    }
}
