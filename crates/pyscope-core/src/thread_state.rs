//! # Thread State Locator
//!
//! Finds the interpreter thread state owned by one OS thread.
//!
//! CPython registers each attached thread's `PyThreadState*` in a TSS key
//! (`_PyRuntime.gilstate.autoTSSkey`). Reading that key's TLS slot from the
//! thread's environment block gives the thread state, or null for threads the
//! interpreter never saw. Null is a normal outcome, not an error.

use tracing::debug;

use crate::error::InspectResult;
use crate::layout::{LayoutCatalog, StructKind};
use crate::memory::MemoryAccess;
use crate::target::Target;
use crate::tls::ThreadLocalLookup;
use crate::types::{Address, ThreadId, ThreadInfo};
use crate::version::PythonModule;

/// Global that holds the GIL-state machinery.
pub const RUNTIME_SYMBOL: &str = "_PyRuntime";

/// Struct type of [`RUNTIME_SYMBOL`].
pub const RUNTIME_TYPE: &str = "_PyRuntimeState";

/// Path of the TSS key inside [`RUNTIME_TYPE`].
pub const AUTO_TSS_KEY_PATH: &str = "gilstate.autoTSSkey";

/// Resolved location of the interpreter's GIL-state globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GilState
{
    /// Address of the `Py_tss_t` holding the per-thread key.
    pub tss_key: Address,
}

impl GilState
{
    /// Resolve the TSS key through the host's symbol and type information.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` if the host cannot resolve `_PyRuntime` or the
    /// `gilstate.autoTSSkey` field.
    pub fn resolve<T: Target + ?Sized>(target: &T, module: &PythonModule) -> InspectResult<Self>
    {
        let runtime = target.symbol_address(&module.name, RUNTIME_SYMBOL)?;
        let offset = target.field_offset(&module.name, RUNTIME_TYPE, AUTO_TSS_KEY_PATH)?;
        let tss_key = runtime + offset;
        debug!(%runtime, %tss_key, "resolved gil state key");
        Ok(Self { tss_key })
    }
}

/// Whether an OS thread runs Python code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonThread
{
    /// The thread has an interpreter thread state.
    Attached
    {
        /// OS thread.
        thread: ThreadId,
        /// Its `PyThreadState*`.
        thread_state: Address,
    },
    /// The thread never registered with the interpreter.
    NotAttached(ThreadId),
}

impl PythonThread
{
    /// Thread state, if attached.
    pub fn thread_state(self) -> Option<Address>
    {
        match self {
            PythonThread::Attached { thread_state, .. } => Some(thread_state),
            PythonThread::NotAttached(_) => None,
        }
    }

    /// `true` for threads with a thread state.
    pub fn is_attached(self) -> bool
    {
        matches!(self, PythonThread::Attached { .. })
    }
}

/// Locates thread states through the GIL-state TSS key.
pub struct ThreadStateLocator<'a>
{
    catalog: &'a LayoutCatalog,
    gil_state: GilState,
    tls: &'a dyn ThreadLocalLookup,
}

impl<'a> ThreadStateLocator<'a>
{
    /// Create a locator.
    pub fn new(catalog: &'a LayoutCatalog, gil_state: GilState, tls: &'a dyn ThreadLocalLookup) -> Self
    {
        Self {
            catalog,
            gil_state,
            tls,
        }
    }

    /// Read the thread state of `thread`, or `None` if it has none.
    ///
    /// An uninitialised TSS key means the interpreter has not set up thread
    /// tracking yet, so no thread is attached.
    ///
    /// ## Errors
    ///
    /// Memory and TLS failures are surfaced unchanged.
    pub fn locate<M: MemoryAccess>(&self, memory: &M, thread: &ThreadInfo) -> InspectResult<Option<Address>>
    {
        let tss = self.catalog.get(StructKind::TssKey)?;
        let initialized = memory.read_signed_field(self.gil_state.tss_key, tss.field("_is_initialized")?)?;
        if initialized == 0 {
            debug!(thread = thread.id.raw(), "tss key not initialized");
            return Ok(None);
        }

        let key = memory.read_unsigned_field(self.gil_state.tss_key, tss.field("_key")?)?;
        let slot = u32::try_from(key).unwrap_or(u32::MAX);
        let thread_state = self.tls.tls_value(memory, thread.environment_block, slot)?;
        if thread_state.is_null() {
            debug!(thread = thread.id.raw(), slot, "thread has no python thread state");
            return Ok(None);
        }

        debug!(thread = thread.id.raw(), %thread_state, "found python thread state");
        Ok(Some(thread_state))
    }

    /// Classify `thread` as attached or not.
    pub fn classify<M: MemoryAccess>(&self, memory: &M, thread: &ThreadInfo) -> InspectResult<PythonThread>
    {
        Ok(match self.locate(memory, thread)? {
            Some(thread_state) => PythonThread::Attached {
                thread: thread.id,
                thread_state,
            },
            None => PythonThread::NotAttached(thread.id),
        })
    }
}
