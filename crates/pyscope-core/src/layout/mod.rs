//! # Type Layouts
//!
//! Declarative descriptions of the interpreter structs we read.
//!
//! Each runtime struct (thread state, frame, code object, string shapes, …)
//! is modelled as a [`TypeLayout`]: a name, a total size, and a map from
//! field name to `(offset, size, interpretation)`. Nothing is ever cast to a
//! native Rust struct. Layouts are target-defined and version-dependent, and
//! a native struct would statically lock in one version.
//!
//! The [`catalog`] module groups one layout per [`StructKind`] for a single
//! version family.

pub mod catalog;

use std::collections::HashMap;
use std::fmt;

pub use catalog::LayoutCatalog;

use crate::error::{InspectError, InspectResult};

/// How the bytes of a field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind
{
    /// Little-endian unsigned integer (also used for bitfield words and the
    /// first element of inline arrays).
    Unsigned,
    /// Little-endian two's complement integer.
    Signed,
    /// Pointer into the target's address space.
    Pointer,
}

impl fmt::Display for FieldKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            FieldKind::Unsigned => "unsigned",
            FieldKind::Signed => "signed",
            FieldKind::Pointer => "pointer",
        };
        write!(f, "{label}")
    }
}

/// One field of a foreign struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field
{
    /// Byte offset from the start of the struct.
    pub offset: u64,
    /// Width in bytes (1, 2, 4 or 8).
    pub size: u8,
    /// Interpretation of the bytes.
    pub kind: FieldKind,
}

impl Field
{
    /// Describe a field.
    pub const fn new(offset: u64, size: u8, kind: FieldKind) -> Self
    {
        Self { offset, size, kind }
    }
}

/// Runtime structs the decoder needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind
{
    /// `PyObject`
    Object,
    /// `PyVarObject`
    VarObject,
    /// `PyTypeObject`
    TypeObject,
    /// `PyBytesObject`
    Bytes,
    /// `PyASCIIObject`
    AsciiUnicode,
    /// `PyCompactUnicodeObject`
    CompactUnicode,
    /// `PyUnicodeObject`
    Unicode,
    /// `PyCodeObject`
    Code,
    /// The frame record the chain links through: `PyFrameObject` up to 3.10,
    /// `_PyInterpreterFrame` from 3.11.
    Frame,
    /// `PyFrameObject` wrapping an interpreter frame (3.11+ only).
    FrameObject,
    /// `PyThreadState`
    ThreadState,
    /// `_PyCFrame`, the execution-context wrapper (3.11+ only).
    CFrame,
    /// `Py_tss_t`
    TssKey,
}

impl StructKind
{
    /// C name of the struct.
    pub const fn c_name(self) -> &'static str
    {
        match self {
            StructKind::Object => "PyObject",
            StructKind::VarObject => "PyVarObject",
            StructKind::TypeObject => "PyTypeObject",
            StructKind::Bytes => "PyBytesObject",
            StructKind::AsciiUnicode => "PyASCIIObject",
            StructKind::CompactUnicode => "PyCompactUnicodeObject",
            StructKind::Unicode => "PyUnicodeObject",
            StructKind::Code => "PyCodeObject",
            StructKind::Frame => "PyFrameObject",
            StructKind::FrameObject => "PyFrameObject (3.11)",
            StructKind::ThreadState => "PyThreadState",
            StructKind::CFrame => "_PyCFrame",
            StructKind::TssKey => "Py_tss_t",
        }
    }
}

impl fmt::Display for StructKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.c_name())
    }
}

/// Field map of one foreign struct.
///
/// Immutable once built; the `with_*` methods consume and return the layout
/// so a table reads as a single expression.
///
/// ```rust
/// use pyscope_core::layout::{FieldKind, TypeLayout};
///
/// let tss = TypeLayout::new("Py_tss_t", 8)
///     .with_signed("_is_initialized", 0, 4)
///     .with_unsigned("_key", 4, 4);
/// assert_eq!(tss.field("_key").unwrap().kind, FieldKind::Unsigned);
/// assert!(tss.field("missing").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLayout
{
    name: String,
    size: u64,
    fields: HashMap<String, Field>,
}

impl TypeLayout
{
    /// Start an empty layout.
    pub fn new(name: impl Into<String>, size: u64) -> Self
    {
        Self {
            name: name.into(),
            size,
            fields: HashMap::new(),
        }
    }

    /// Add a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self
    {
        self.fields.insert(name.into(), field);
        self
    }

    /// Add an unsigned integer field.
    #[must_use]
    pub fn with_unsigned(self, name: impl Into<String>, offset: u64, size: u8) -> Self
    {
        self.with_field(name, Field::new(offset, size, FieldKind::Unsigned))
    }

    /// Add a signed integer field.
    #[must_use]
    pub fn with_signed(self, name: impl Into<String>, offset: u64, size: u8) -> Self
    {
        self.with_field(name, Field::new(offset, size, FieldKind::Signed))
    }

    /// Add a pointer field (always 8 bytes in the built-in tables).
    #[must_use]
    pub fn with_pointer(self, name: impl Into<String>, offset: u64) -> Self
    {
        self.with_field(name, Field::new(offset, 8, FieldKind::Pointer))
    }

    /// Struct name.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// `sizeof` the struct.
    pub fn size(&self) -> u64
    {
        self.size
    }

    /// Look up a field by name.
    ///
    /// ## Errors
    ///
    /// `MismatchedLayout` when the field does not exist in this layout. That
    /// almost always means a version family's field name was used against
    /// another family's struct.
    pub fn field(&self, name: &str) -> InspectResult<Field>
    {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| InspectError::MismatchedLayout(format!("{} has no field `{name}`", self.name)))
    }

    /// `true` if the layout defines `name`.
    pub fn has_field(&self, name: &str) -> bool
    {
        self.fields.contains_key(name)
    }
}
