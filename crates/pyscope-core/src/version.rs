//! # Version Detection and Dispatch
//!
//! Maps the interpreter found in the target to a [`VersionFamily`].
//!
//! The runtime is recognised by its module file name (`python311.dll`,
//! `python39_d.dll`, …). The digits after `python` are the numeric version
//! (`3` followed by the minor number), which is all the decoder needs to pick
//! a layout catalog and a line-number algorithm.
//!
//! The mapping from numeric version to family is an exhaustive `match`, so a
//! new runtime is one new arm rather than another conditional.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{InspectError, InspectResult};
use crate::types::{Address, ModuleInfo};

static PYTHON_MODULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^python(3\d+)(?:_d)?\.dll$").expect("python module pattern is valid"));

/// Layout and algorithm family of an interpreter.
///
/// Determined once per target process and reused for every walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionFamily
{
    /// 3.7, 3.8 and 3.9: frame objects, `co_lnotab` delta pairs.
    Legacy,
    /// 3.10: frame objects, `co_linetable` address ranges.
    V310,
    /// 3.11: interpreter frames behind `_PyCFrame`, instruction pointer
    /// instead of an instruction index.
    V311Plus,
}

impl VersionFamily
{
    /// Select the family for a numeric version such as `39` or `311`.
    ///
    /// ## Errors
    ///
    /// `UnsupportedVersion` for anything without a layout catalog.
    ///
    /// ```rust
    /// use pyscope_core::version::VersionFamily;
    ///
    /// assert_eq!(VersionFamily::for_version(37).unwrap(), VersionFamily::for_version(39).unwrap());
    /// assert!(VersionFamily::for_version(312).is_err());
    /// ```
    pub fn for_version(version: u32) -> InspectResult<Self>
    {
        match version {
            37 | 38 | 39 => Ok(VersionFamily::Legacy),
            310 => Ok(VersionFamily::V310),
            311 => Ok(VersionFamily::V311Plus),
            other => Err(InspectError::UnsupportedVersion(other)),
        }
    }
}

impl fmt::Display for VersionFamily
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            VersionFamily::Legacy => "legacy (<=3.9)",
            VersionFamily::V310 => "3.10",
            VersionFamily::V311Plus => "3.11+",
        };
        f.write_str(label)
    }
}

/// The interpreter module selected in a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonModule
{
    /// Module name exactly as the host reported it; used for symbol lookups.
    pub name: String,
    /// Load address of the module.
    pub base: Address,
    /// Numeric version (`37`, `310`, …).
    pub version: u32,
    /// Family selected for `version`.
    pub family: VersionFamily,
}

impl fmt::Display for PythonModule
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} (version {}, {})", self.name, self.version, self.family)
    }
}

/// Parse the numeric version out of a Python runtime module file name.
///
/// Returns `None` for modules that are not a Python runtime.
pub fn module_version(module: &ModuleInfo) -> Option<u32>
{
    PYTHON_MODULE
        .captures(module.file_name())
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Find the single Python runtime among `modules` and select its family.
///
/// ## Errors
///
/// - `NoInterpreterFound`: no module name matches
/// - `AmbiguousInterpreter`: more than one module name matches
/// - `UnsupportedVersion`: the one match has a version we have no family for
pub fn detect_version(modules: &[ModuleInfo]) -> InspectResult<PythonModule>
{
    let candidates: Vec<(&ModuleInfo, u32)> = modules
        .iter()
        .filter_map(|module| module_version(module).map(|version| (module, version)))
        .collect();

    match candidates.as_slice() {
        [] => Err(InspectError::NoInterpreterFound),
        [(module, version)] => {
            let family = VersionFamily::for_version(*version)?;
            debug!(module = %module.name, version, %family, "selected python runtime");
            Ok(PythonModule {
                name: module.name.clone(),
                base: module.base,
                version: *version,
                family,
            })
        }
        many => Err(InspectError::AmbiguousInterpreter(
            many.iter()
                .map(|(module, version)| format!("{} ({version})", module.file_name()))
                .collect(),
        )),
    }
}
