//! # pyscope-core
//!
//! Reconstructs Python call stacks from the raw memory of a CPython process.
//!
//! Given read access to a target's memory and a few answers from the host
//! (loaded modules, threads, one symbol and one field offset), this crate:
//! - Detects which interpreter version is loaded
//! - Finds each OS thread's interpreter thread state through its TLS slot
//! - Walks the frame chain from the innermost frame outward
//! - Decodes filenames, function names and current lines into plain values
//!
//! Nothing here attaches to, stops or writes to a process. The host provides
//! a [`Target`](target::Target) and is responsible for keeping the target
//! quiesced while a stack is read.
//!
//! ## Supported interpreters
//!
//! - **3.7 – 3.9**: `PyFrameObject` chains, `co_lnotab` line tables
//! - **3.10**: `PyFrameObject` chains, `co_linetable` address ranges
//! - **3.11**: `_PyInterpreterFrame` chains behind `_PyCFrame`
//!
//! ## Layers
//!
//! ```text
//! stack         StackInspector: attach, resolve_stack, resolve_all_threads
//!  ├─ version / interpreter   module detection, family, layout catalog
//!  ├─ thread_state / tls      GIL-state TSS key → thread state
//!  ├─ frames                  lazy frame chain walk with depth/cycle guards
//!  ├─ lines                   lnotab and range-table line resolution
//!  └─ unicode / object        string decoding, type checks, bytes payloads
//! memory        MemoryAccess: the only path from an address to bytes
//! ```

pub mod config;
pub mod error;
pub mod frames;
pub mod interpreter;
pub mod layout;
pub mod lines;
pub mod memory;
pub mod object;
pub mod prelude;
pub mod stack;
pub mod target;
pub mod thread_state;
pub mod tls;
pub mod types;
pub mod unicode;
pub mod version;

pub use config::InspectorConfig;
// Re-export commonly used types
pub use error::{InspectError, InspectResult};
pub use stack::{detect_interpreter, StackInspector};
pub use types::{Address, LineNumber, ResolvedFrame, ThreadStack};
pub use version::VersionFamily;
