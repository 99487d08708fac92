//! # Error Types
//!
//! General error handling for the interpreter decoder.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::{Address, ThreadId};

/// Main error type for inspection operations
///
/// This enum represents all the ways reading a Python stack out of a target
/// process can fail. Each variant corresponds to a specific condition that can
/// occur while interpreting foreign interpreter memory.
///
/// ## Error Categories
///
/// 1. **Discovery errors**: NoInterpreterFound, AmbiguousInterpreter, UnsupportedVersion
/// 2. **Memory errors**: UnreadableMemory, CorruptObject
/// 3. **Thread errors**: NotAttachedThread, TlsSlotOutOfRange
/// 4. **Frame chain errors**: FrameChainTooLong, SuspectedCycle
/// 5. **Layout errors**: MismatchedLayout, SymbolNotFound
/// 6. **Line table errors**: MalformedLineTable (never escapes a line resolver)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectError
{
    /// No loaded module looks like a Python runtime
    #[error("No Python interpreter found in target")]
    NoInterpreterFound,

    /// More than one loaded module looks like a Python runtime
    ///
    /// Each entry is rendered as `name (version)`. We refuse to guess which
    /// runtime the caller meant.
    #[error("Multiple Python interpreters found: {}", .0.join(", "))]
    AmbiguousInterpreter(Vec<String>),

    /// The detected runtime version has no layout or algorithm family
    #[error("Unsupported Python version: {0}")]
    UnsupportedVersion(u32),

    /// A span of target memory could not be read in full
    ///
    /// Reads never partially succeed: either every requested byte was
    /// legible or this error is returned.
    #[error("Unreadable memory: {len} bytes at {address}")]
    UnreadableMemory
    {
        /// Start of the requested span
        address: Address,
        /// Number of bytes requested
        len: usize,
    },

    /// The OS thread has no interpreter thread state
    ///
    /// Returned only by operations that require an attached thread. Thread
    /// classification itself reports this as a normal outcome.
    #[error("Thread {} is not attached to the interpreter", .0.raw())]
    NotAttachedThread(ThreadId),

    /// A line table could not be decoded
    #[error("Malformed line table: {0}")]
    MalformedLineTable(String),

    /// A layout was used against data from a different version family, or a
    /// required struct/field is absent from the catalog
    #[error("Mismatched layout: {0}")]
    MismatchedLayout(String),

    /// The frame chain exceeded the configured maximum depth
    #[error("Frame chain exceeded {limit} frames")]
    FrameChainTooLong
    {
        /// Configured depth limit
        limit: usize,
    },

    /// The frame chain revisited a frame it had already produced
    #[error("Frame chain revisits frame at {address}")]
    SuspectedCycle
    {
        /// Frame that was reached twice
        address: Address,
    },

    /// A thread-local slot index beyond the addressable range
    #[error("Invalid TLS slot {0}")]
    TlsSlotOutOfRange(u32),

    /// The host could not resolve a global or type field
    #[error("Symbol not found: {module}!{symbol}")]
    SymbolNotFound
    {
        /// Module the lookup was made against
        module: String,
        /// Symbol or `type.field` path that was requested
        symbol: String,
    },

    /// An object's header holds values that cannot describe a real object
    #[error("Corrupt object at {address}: {reason}")]
    CorruptObject
    {
        /// Address of the object
        address: Address,
        /// What was wrong with it
        reason: String,
    },

    /// Invalid argument passed to an inspector function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for `Result<T, InspectError>`
///
/// ```rust
/// use pyscope_core::error::InspectResult;
/// fn foo() -> InspectResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type InspectResult<T> = std::result::Result<T, InspectError>;
