//! # Snapshot Documents
//!
//! JSON form of a captured process: the memory regions plus the host answers
//! (modules, threads, symbols, field offsets) the decoder asks for.
//!
//! Addresses are written as `"0x…"` strings and region contents as lowercase
//! hex, so a document can be produced by any capture tool without a Rust
//! dependency.
//!
//! ```json
//! {
//!   "modules": [{ "name": "C:\\Python311\\python311.dll", "base": "0x7ff000000000" }],
//!   "threads": [{ "id": 4120, "environment_block": "0x3d1000" }],
//!   "symbols": [{ "module": "C:\\Python311\\python311.dll", "symbol": "_PyRuntime", "address": "0x7ff0001c8000" }],
//!   "field_offsets": [{ "module": "C:\\Python311\\python311.dll", "type_name": "_PyRuntimeState",
//!                       "field_path": "gilstate.autoTSSkey", "offset": 584 }],
//!   "regions": [{ "base": "0x3d1000", "bytes": "00000000…" }]
//! }
//! ```

use std::fs;
use std::path::Path;

use pyscope_core::error::InspectError;
use pyscope_core::memory::SnapshotMemory;
use pyscope_core::target::StaticTarget;
use pyscope_core::types::{Address, ModuleInfo, ThreadInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Snapshot loading error
#[derive(Debug, Error)]
pub enum SnapshotError
{
    /// The document could not be read from disk
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid snapshot JSON
    #[error("Invalid snapshot document: {0}")]
    Json(#[from] serde_json::Error),

    /// A region's contents are not valid hex
    #[error("Invalid hex in region at {base}: {source}")]
    Hex
    {
        /// Base of the offending region
        base: Address,
        /// Decoder error
        source: hex::FromHexError,
    },

    /// Regions could not be assembled into an address space
    #[error(transparent)]
    Memory(#[from] InspectError),
}

/// A loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry
{
    pub name: String,
    #[serde(with = "hex_address")]
    pub base: Address,
}

/// An OS thread and its environment block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEntry
{
    pub id: u64,
    #[serde(with = "hex_address")]
    pub environment_block: Address,
}

/// A resolved global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry
{
    pub module: String,
    pub symbol: String,
    #[serde(with = "hex_address")]
    pub address: Address,
}

/// A resolved type field offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOffsetEntry
{
    pub module: String,
    pub type_name: String,
    pub field_path: String,
    pub offset: u64,
}

/// A captured span of memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEntry
{
    #[serde(with = "hex_address")]
    pub base: Address,
    /// Hex-encoded contents
    pub bytes: String,
}

/// A whole snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot
{
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
    #[serde(default)]
    pub threads: Vec<ThreadEntry>,
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
    #[serde(default)]
    pub field_offsets: Vec<FieldOffsetEntry>,
    #[serde(default)]
    pub regions: Vec<RegionEntry>,
}

impl Snapshot
{
    /// Read and parse a snapshot document.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read, `Json` if it does not parse.
    pub fn load(path: &Path) -> Result<Self, SnapshotError>
    {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a snapshot document.
    ///
    /// ## Errors
    ///
    /// `Json` if the text is not a snapshot document.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError>
    {
        Ok(serde_json::from_str(text)?)
    }

    /// Assemble the captured process.
    ///
    /// ## Errors
    ///
    /// `Hex` for undecodable region contents, `Memory` for empty or
    /// overlapping regions.
    pub fn into_target(self) -> Result<StaticTarget, SnapshotError>
    {
        let mut memory = SnapshotMemory::new();
        for region in self.regions {
            let bytes = hex::decode(&region.bytes).map_err(|source| SnapshotError::Hex {
                base: region.base,
                source,
            })?;
            memory.add_region(region.base, bytes)?;
        }
        debug!(
            modules = self.modules.len(),
            threads = self.threads.len(),
            mapped = memory.mapped_len(),
            "loaded snapshot"
        );

        let mut target = StaticTarget::new(memory);
        for module in self.modules {
            target = target.with_module(ModuleInfo::new(module.name, module.base));
        }
        for thread in self.threads {
            target = target.with_thread(ThreadInfo::new(thread.id, thread.environment_block));
        }
        for symbol in self.symbols {
            target = target.with_symbol(symbol.module, symbol.symbol, symbol.address);
        }
        for field in self.field_offsets {
            target = target.with_field_offset(field.module, field.type_name, field.field_path, field.offset);
        }
        Ok(target)
    }
}

/// Serde adapter writing addresses as `"0x…"` and reading either that or a
/// plain JSON number.
mod hex_address
{
    use pyscope_core::types::Address;
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error>
    {
        serializer.collect_str(&format_args!("{:#x}", address.value()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error>
    {
        deserializer.deserialize_any(AddressVisitor)
    }

    struct AddressVisitor;

    impl Visitor<'_> for AddressVisitor
    {
        type Value = Address;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
        {
            f.write_str("an address as a 0x-prefixed hex string or an unsigned integer")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Address, E>
        {
            Ok(Address::new(value))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Address, E>
        {
            let digits = value
                .strip_prefix("0x")
                .or_else(|| value.strip_prefix("0X"))
                .ok_or_else(|| E::custom(format!("address {value:?} is missing the 0x prefix")))?;
            u64::from_str_radix(&digits.replace('_', ""), 16)
                .map(Address::new)
                .map_err(|e| E::custom(format!("invalid address {value:?}: {e}")))
        }
    }
}

#[cfg(test)]
mod tests
{
    use pyscope_core::memory::MemoryAccess;
    use pyscope_core::target::Target;

    use super::*;

    const DOCUMENT: &str = r#"{
        "modules": [{ "name": "C:\\Python\\python310.dll", "base": "0x7ff0_0000" }],
        "threads": [{ "id": 17, "environment_block": 4096 }],
        "symbols": [{ "module": "C:\\Python\\python310.dll", "symbol": "_PyRuntime", "address": "0x2000" }],
        "field_offsets": [{ "module": "C:\\Python\\python310.dll", "type_name": "_PyRuntimeState",
                            "field_path": "gilstate.autoTSSkey", "offset": 584 }],
        "regions": [{ "base": "0x1000", "bytes": "deadbeef" }]
    }"#;

    #[test]
    fn test_document_into_target()
    {
        let target = Snapshot::from_json(DOCUMENT).unwrap().into_target().unwrap();
        let module = r"C:\Python\python310.dll";

        assert_eq!(target.modules().unwrap()[0].base, Address::new(0x7ff0_0000));
        assert_eq!(target.threads().unwrap()[0], ThreadInfo::new(17u64, 0x1000u64));
        assert_eq!(target.symbol_address(module, "_PyRuntime").unwrap(), Address::new(0x2000));
        assert_eq!(
            target
                .field_offset(module, "_PyRuntimeState", "gilstate.autoTSSkey")
                .unwrap(),
            584
        );
        assert_eq!(target.read(Address::new(0x1001), 2).unwrap(), vec![0xad, 0xbe]);
    }

    #[test]
    fn test_missing_sections_default_to_empty()
    {
        let snapshot = Snapshot::from_json("{}").unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_addresses_serialize_as_hex()
    {
        let entry = ModuleEntry {
            name: "python39.dll".into(),
            base: Address::new(0x7ff0_0000),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"name":"python39.dll","base":"0x7ff00000"}"#);
        assert_eq!(serde_json::from_str::<ModuleEntry>(&json).unwrap(), entry);
    }

    #[test]
    fn test_rejects_unprefixed_address()
    {
        let result = Snapshot::from_json(r#"{ "modules": [{ "name": "a.dll", "base": "1000" }] }"#);
        assert!(matches!(result, Err(SnapshotError::Json(_))));
    }

    #[test]
    fn test_rejects_bad_hex()
    {
        let result = Snapshot::from_json(r#"{ "regions": [{ "base": "0x1000", "bytes": "zz" }] }"#)
            .unwrap()
            .into_target();
        assert!(matches!(result, Err(SnapshotError::Hex { .. })));
    }

    #[test]
    fn test_rejects_overlapping_regions()
    {
        let result = Snapshot::from_json(
            r#"{ "regions": [
                { "base": "0x1000", "bytes": "00000000" },
                { "base": "0x1002", "bytes": "0000" }
            ] }"#,
        )
        .unwrap()
        .into_target();
        assert!(matches!(result, Err(SnapshotError::Memory(InspectError::InvalidArgument(_)))));
    }
}
