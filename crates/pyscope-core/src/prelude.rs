//! Common module for library exports

pub use crate::config::InspectorConfig;
pub use crate::error::{InspectError, InspectResult};
pub use crate::memory::{MemoryAccess, SnapshotMemory};
pub use crate::stack::{detect_interpreter, ResolvedFrames, StackInspector};
pub use crate::target::{StaticTarget, Target};
pub use crate::thread_state::PythonThread;
pub use crate::tls::{TebTls, ThreadLocalLookup};
pub use crate::types::{Address, LineNumber, ModuleInfo, ResolvedFrame, ThreadId, ThreadInfo, ThreadStack};
pub use crate::version::{PythonModule, VersionFamily};
