//! Thread and module descriptors supplied by the host.

use std::fmt;

use super::Address;

/// Thread identifier
///
/// Identifies an OS thread of the target process. The exact representation
/// is whatever the host enumerates threads by (a Windows thread id, a Linux
/// TID). We store it as a `u64` to stay platform-agnostic.
///
/// ## Example
///
/// ```rust
/// use pyscope_core::types::ThreadId;
///
/// let thread = ThreadId::from(12345);
/// assert_eq!(thread.raw(), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Get the raw `u64` representation of the thread identifier
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// One OS thread of the target, as enumerated by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo
{
    /// Thread identifier
    pub id: ThreadId,
    /// Address of the thread's environment block (TEB on Windows)
    pub environment_block: Address,
}

impl ThreadInfo
{
    /// Describe a thread by id and environment block.
    pub fn new(id: impl Into<ThreadId>, environment_block: impl Into<Address>) -> Self
    {
        Self {
            id: id.into(),
            environment_block: environment_block.into(),
        }
    }
}

/// A module loaded into the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    /// Module path or name as reported by the host
    pub name: String,
    /// Load address of the module image
    pub base: Address,
}

impl ModuleInfo
{
    /// Describe a loaded module.
    pub fn new(name: impl Into<String>, base: impl Into<Address>) -> Self
    {
        Self {
            name: name.into(),
            base: base.into(),
        }
    }

    /// Final path component of the module name
    ///
    /// Hosts report both `\`-separated Windows paths and `/`-separated ones.
    ///
    /// ```rust
    /// use pyscope_core::types::ModuleInfo;
    ///
    /// let module = ModuleInfo::new(r"C:\Python311\python311.dll", 0x1000);
    /// assert_eq!(module.file_name(), "python311.dll");
    /// ```
    pub fn file_name(&self) -> &str
    {
        self.name.rsplit(['\\', '/']).next().unwrap_or(&self.name)
    }
}
