//! # Types
//!
//! Plain value types shared by every component of the decoder.
//!
//! None of these types hold a reference into target memory; addresses are
//! opaque numbers until a [`MemoryAccess`](crate::memory::MemoryAccess) reads
//! them.

pub mod address;
pub mod frame;
pub mod process;

// Re-export all public types
pub use address::Address;
pub use frame::{LineNumber, ResolvedFrame, ThreadStack};
pub use process::{ModuleInfo, ThreadId, ThreadInfo};
