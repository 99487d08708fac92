//! Detected interpreter plus the layout tables that describe it.

use tracing::debug;

use crate::error::{InspectError, InspectResult};
use crate::layout::LayoutCatalog;
use crate::lines::LineAlgorithm;
use crate::version::{PythonModule, VersionFamily};

/// A Python runtime in the target with its layout catalog.
///
/// Built once per target and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter
{
    module: PythonModule,
    catalog: LayoutCatalog,
}

impl Interpreter
{
    /// Pair `module` with the built-in tables for its version.
    ///
    /// ## Errors
    ///
    /// `UnsupportedVersion` when no built-in tables exist.
    pub fn new(module: PythonModule) -> InspectResult<Self>
    {
        let catalog = LayoutCatalog::builtin(module.version)?;
        Self::with_catalog(module, catalog)
    }

    /// Pair `module` with host-supplied tables.
    ///
    /// ## Errors
    ///
    /// `MismatchedLayout` if the catalog describes another family.
    pub fn with_catalog(module: PythonModule, catalog: LayoutCatalog) -> InspectResult<Self>
    {
        if catalog.family() != module.family {
            return Err(InspectError::MismatchedLayout(format!(
                "{} layouts cannot describe {module}",
                catalog.family()
            )));
        }
        debug!(%module, "interpreter layouts ready");
        Ok(Self { module, catalog })
    }

    /// The runtime module.
    pub fn module(&self) -> &PythonModule
    {
        &self.module
    }

    /// Layout tables.
    pub fn catalog(&self) -> &LayoutCatalog
    {
        &self.catalog
    }

    /// Version family.
    pub fn family(&self) -> VersionFamily
    {
        self.module.family
    }

    /// Line-number algorithm for this interpreter.
    pub fn line_algorithm(&self) -> LineAlgorithm
    {
        LineAlgorithm::for_family(self.module.family)
    }
}
