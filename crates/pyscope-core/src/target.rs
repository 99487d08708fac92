//! # Target
//!
//! The host-side capabilities the decoder consumes.
//!
//! Enumerating threads and modules and resolving symbols are the host's job
//! (a debugger engine, a minidump reader, …). The decoder only needs the
//! answers, through the [`Target`] trait. [`StaticTarget`] is a fully
//! in-memory implementation for captured snapshots and tests.

use std::collections::HashMap;

use crate::error::{InspectError, InspectResult};
use crate::memory::{MemoryAccess, SnapshotMemory};
use crate::types::{Address, ModuleInfo, ThreadInfo};

/// Memory, process and symbol capabilities of an inspected process.
pub trait Target: MemoryAccess
{
    /// Modules loaded into the process.
    fn modules(&self) -> InspectResult<Vec<ModuleInfo>>;

    /// OS threads of the process with their environment blocks.
    fn threads(&self) -> InspectResult<Vec<ThreadInfo>>;

    /// Absolute address of a global in `module`.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` when the host has no such symbol.
    fn symbol_address(&self, module: &str, symbol: &str) -> InspectResult<Address>;

    /// Byte offset of a (possibly nested, `.`-separated) field path inside a
    /// type of `module`.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` when the host has no such type or field.
    fn field_offset(&self, module: &str, type_name: &str, field_path: &str) -> InspectResult<u64>;
}

/// A captured process: memory image plus the host answers that go with it.
#[derive(Debug, Clone, Default)]
pub struct StaticTarget
{
    memory: SnapshotMemory,
    modules: Vec<ModuleInfo>,
    threads: Vec<ThreadInfo>,
    symbols: HashMap<(String, String), Address>,
    field_offsets: HashMap<(String, String, String), u64>,
}

impl StaticTarget
{
    /// Wrap a memory image with no modules, threads or symbols.
    pub fn new(memory: SnapshotMemory) -> Self
    {
        Self {
            memory,
            ..Self::default()
        }
    }

    /// Add a loaded module.
    #[must_use]
    pub fn with_module(mut self, module: ModuleInfo) -> Self
    {
        self.modules.push(module);
        self
    }

    /// Add a thread.
    #[must_use]
    pub fn with_thread(mut self, thread: ThreadInfo) -> Self
    {
        self.threads.push(thread);
        self
    }

    /// Register a global's address.
    #[must_use]
    pub fn with_symbol(mut self, module: impl Into<String>, symbol: impl Into<String>, address: Address) -> Self
    {
        self.symbols.insert((module.into(), symbol.into()), address);
        self
    }

    /// Register a type field offset.
    #[must_use]
    pub fn with_field_offset(
        mut self,
        module: impl Into<String>,
        type_name: impl Into<String>,
        field_path: impl Into<String>,
        offset: u64,
    ) -> Self
    {
        self.field_offsets
            .insert((module.into(), type_name.into(), field_path.into()), offset);
        self
    }

    /// Underlying memory image.
    pub fn memory(&self) -> &SnapshotMemory
    {
        &self.memory
    }

    /// Mutable access to the memory image.
    pub fn memory_mut(&mut self) -> &mut SnapshotMemory
    {
        &mut self.memory
    }
}

impl MemoryAccess for StaticTarget
{
    fn read(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        self.memory.read(address, len)
    }
}

impl Target for StaticTarget
{
    fn modules(&self) -> InspectResult<Vec<ModuleInfo>>
    {
        Ok(self.modules.clone())
    }

    fn threads(&self) -> InspectResult<Vec<ThreadInfo>>
    {
        Ok(self.threads.clone())
    }

    fn symbol_address(&self, module: &str, symbol: &str) -> InspectResult<Address>
    {
        self.symbols
            .get(&(module.to_owned(), symbol.to_owned()))
            .copied()
            .ok_or_else(|| InspectError::SymbolNotFound {
                module: module.to_owned(),
                symbol: symbol.to_owned(),
            })
    }

    fn field_offset(&self, module: &str, type_name: &str, field_path: &str) -> InspectResult<u64>
    {
        self.field_offsets
            .get(&(module.to_owned(), type_name.to_owned(), field_path.to_owned()))
            .copied()
            .ok_or_else(|| InspectError::SymbolNotFound {
                module: module.to_owned(),
                symbol: format!("{type_name}.{field_path}"),
            })
    }
}
