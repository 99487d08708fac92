//! # Layout Catalog
//!
//! One [`TypeLayout`] per [`StructKind`] for a single interpreter version.
//!
//! The built-in tables describe 64-bit Windows builds of CPython (LLP64:
//! pointers and `Py_ssize_t` are 8 bytes, `long` and `wchar_t`-sized units
//! are narrower). Hosts that resolve layouts from debug information can
//! assemble their own catalog with [`LayoutCatalog::new`] and
//! [`LayoutCatalog::with_layout`].
//!
//! ## Version differences
//!
//! - **3.7**: no `co_posonlyargcount`, so every code object field after
//!   `co_argcount` sits 4 bytes lower than in 3.8/3.9.
//! - **3.8/3.9**: identical tables.
//! - **3.10**: `co_lnotab` becomes `co_linetable`; `PyFrameObject` drops
//!   `f_stacktop`, moving `f_trace`, `f_lasti` and `f_lineno`.
//! - **3.11**: code objects are variable-sized with the bytecode inline
//!   (`co_code_adaptive`); the thread state reaches frames through
//!   `_PyCFrame`, and frames are `_PyInterpreterFrame` records.

use std::collections::HashMap;

use super::{Field, StructKind, TypeLayout};
use crate::error::{InspectError, InspectResult};
use crate::version::VersionFamily;

/// Layout tables for one interpreter version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutCatalog
{
    family: VersionFamily,
    structs: HashMap<StructKind, TypeLayout>,
    wchar_size: u8,
    code_unit_size: u8,
}

impl LayoutCatalog
{
    /// Start an empty catalog for `family`.
    ///
    /// `wchar_size` is the target's `wchar_t` width (2 on Windows, 4 on most
    /// Unix targets); `code_unit_size` is `sizeof(_Py_CODEUNIT)`.
    pub fn new(family: VersionFamily, wchar_size: u8, code_unit_size: u8) -> Self
    {
        Self {
            family,
            structs: HashMap::new(),
            wchar_size,
            code_unit_size,
        }
    }

    /// Add or replace the layout of one struct.
    #[must_use]
    pub fn with_layout(mut self, kind: StructKind, layout: TypeLayout) -> Self
    {
        self.structs.insert(kind, layout);
        self
    }

    /// Built-in tables for a numeric version (`37`, `38`, `39`, `310`, `311`).
    ///
    /// ## Errors
    ///
    /// `UnsupportedVersion` when no table exists.
    pub fn builtin(version: u32) -> InspectResult<Self>
    {
        let family = VersionFamily::for_version(version)?;
        let catalog = Self::new(family, 2, 2).with_common_layouts();
        let catalog = match version {
            37 => catalog
                .with_layout(StructKind::Code, code_37())
                .with_layout(StructKind::Frame, frame_legacy())
                .with_layout(StructKind::ThreadState, thread_state_legacy()),
            38 | 39 => catalog
                .with_layout(StructKind::Code, code_38())
                .with_layout(StructKind::Frame, frame_legacy())
                .with_layout(StructKind::ThreadState, thread_state_legacy()),
            310 => catalog
                .with_layout(StructKind::Code, code_310())
                .with_layout(StructKind::Frame, frame_310())
                .with_layout(StructKind::ThreadState, thread_state_legacy()),
            311 => catalog
                .with_layout(StructKind::Code, code_311())
                .with_layout(StructKind::Frame, interpreter_frame_311())
                .with_layout(StructKind::FrameObject, frame_object_311())
                .with_layout(StructKind::ThreadState, thread_state_311())
                .with_layout(StructKind::CFrame, cframe_311()),
            other => return Err(InspectError::UnsupportedVersion(other)),
        };
        Ok(catalog)
    }

    /// Family these tables belong to.
    pub fn family(&self) -> VersionFamily
    {
        self.family
    }

    /// Width of one target `wchar_t`.
    pub fn wchar_size(&self) -> u8
    {
        self.wchar_size
    }

    /// Width of one `_Py_CODEUNIT`.
    pub fn code_unit_size(&self) -> u8
    {
        self.code_unit_size
    }

    /// Layout of `kind`.
    ///
    /// ## Errors
    ///
    /// `MismatchedLayout` when this version family has no such struct (for
    /// example `_PyCFrame` before 3.11).
    pub fn get(&self, kind: StructKind) -> InspectResult<&TypeLayout>
    {
        self.structs
            .get(&kind)
            .ok_or_else(|| InspectError::MismatchedLayout(format!("no {kind} layout for {} interpreters", self.family)))
    }

    /// Shorthand for `get(kind)?.field(name)`.
    pub fn field(&self, kind: StructKind, name: &str) -> InspectResult<Field>
    {
        self.get(kind)?.field(name)
    }

    /// `true` if a layout for `kind` is present.
    pub fn contains(&self, kind: StructKind) -> bool
    {
        self.structs.contains_key(&kind)
    }

    /// Object, type, bytes, string and TSS layouts are the same from 3.7
    /// through 3.11.
    fn with_common_layouts(self) -> Self
    {
        self.with_layout(
            StructKind::Object,
            TypeLayout::new("PyObject", 16)
                .with_signed("ob_refcnt", 0, 8)
                .with_pointer("ob_type", 8),
        )
        .with_layout(
            StructKind::VarObject,
            TypeLayout::new("PyVarObject", 24)
                .with_signed("ob_refcnt", 0, 8)
                .with_pointer("ob_type", 8)
                .with_signed("ob_size", 16, 8),
        )
        .with_layout(
            StructKind::TypeObject,
            // tp_flags is an `unsigned long`, 4 bytes under LLP64
            TypeLayout::new("PyTypeObject", 416)
                .with_pointer("tp_name", 24)
                .with_unsigned("tp_flags", 168, 4),
        )
        .with_layout(
            StructKind::Bytes,
            TypeLayout::new("PyBytesObject", 33)
                .with_signed("ob_size", 16, 8)
                .with_signed("ob_shash", 24, 8)
                .with_unsigned("ob_sval", 32, 1),
        )
        .with_layout(
            StructKind::AsciiUnicode,
            TypeLayout::new("PyASCIIObject", 48)
                .with_signed("length", 16, 8)
                .with_signed("hash", 24, 8)
                .with_unsigned("state", 32, 4)
                .with_pointer("wstr", 40),
        )
        .with_layout(
            StructKind::CompactUnicode,
            TypeLayout::new("PyCompactUnicodeObject", 72)
                .with_signed("utf8_length", 48, 8)
                .with_pointer("utf8", 56)
                .with_signed("wstr_length", 64, 8),
        )
        .with_layout(
            StructKind::Unicode,
            TypeLayout::new("PyUnicodeObject", 80).with_pointer("data", 72),
        )
        .with_layout(
            StructKind::TssKey,
            TypeLayout::new("Py_tss_t", 8)
                .with_signed("_is_initialized", 0, 4)
                .with_unsigned("_key", 4, 4),
        )
    }
}

fn code_37() -> TypeLayout
{
    TypeLayout::new("PyCodeObject", 160)
        .with_signed("co_firstlineno", 36, 4)
        .with_pointer("co_code", 40)
        .with_pointer("co_filename", 96)
        .with_pointer("co_name", 104)
        .with_pointer("co_lnotab", 112)
}

fn code_38() -> TypeLayout
{
    TypeLayout::new("PyCodeObject", 168)
        .with_signed("co_firstlineno", 40, 4)
        .with_pointer("co_code", 48)
        .with_pointer("co_filename", 104)
        .with_pointer("co_name", 112)
        .with_pointer("co_lnotab", 120)
}

fn code_310() -> TypeLayout
{
    TypeLayout::new("PyCodeObject", 168)
        .with_signed("co_firstlineno", 40, 4)
        .with_pointer("co_code", 48)
        .with_pointer("co_filename", 104)
        .with_pointer("co_name", 112)
        .with_pointer("co_linetable", 120)
}

fn code_311() -> TypeLayout
{
    TypeLayout::new("PyCodeObject", 186)
        .with_signed("co_firstlineno", 72, 4)
        .with_pointer("co_filename", 112)
        .with_pointer("co_name", 120)
        .with_pointer("co_qualname", 128)
        .with_pointer("co_linetable", 136)
        .with_unsigned("co_code_adaptive", 184, 2)
}

fn frame_legacy() -> TypeLayout
{
    TypeLayout::new("PyFrameObject", 120)
        .with_pointer("f_back", 24)
        .with_pointer("f_code", 32)
        .with_pointer("f_trace", 80)
        .with_signed("f_lasti", 104, 4)
        .with_signed("f_lineno", 108, 4)
}

fn frame_310() -> TypeLayout
{
    TypeLayout::new("PyFrameObject", 112)
        .with_pointer("f_back", 24)
        .with_pointer("f_code", 32)
        .with_pointer("f_trace", 72)
        .with_signed("f_lasti", 96, 4)
        .with_signed("f_lineno", 100, 4)
}

fn interpreter_frame_311() -> TypeLayout
{
    TypeLayout::new("_PyInterpreterFrame", 80)
        .with_pointer("f_code", 32)
        .with_pointer("frame_obj", 40)
        .with_pointer("previous", 48)
        .with_pointer("prev_instr", 56)
        .with_signed("stacktop", 64, 4)
}

fn frame_object_311() -> TypeLayout
{
    TypeLayout::new("PyFrameObject", 56)
        .with_pointer("f_back", 16)
        .with_pointer("f_frame", 24)
        .with_pointer("f_trace", 32)
        .with_signed("f_lineno", 40, 4)
}

fn thread_state_legacy() -> TypeLayout
{
    TypeLayout::new("PyThreadState", 200)
        .with_pointer("prev", 0)
        .with_pointer("next", 8)
        .with_pointer("interp", 16)
        .with_pointer("frame", 24)
}

fn thread_state_311() -> TypeLayout
{
    TypeLayout::new("PyThreadState", 256)
        .with_pointer("prev", 0)
        .with_pointer("next", 8)
        .with_pointer("interp", 16)
        .with_pointer("cframe", 56)
}

fn cframe_311() -> TypeLayout
{
    TypeLayout::new("_PyCFrame", 24)
        .with_unsigned("use_tracing", 0, 1)
        .with_pointer("current_frame", 8)
        .with_pointer("previous", 16)
}
