//! Synthetic interpreter heap for integration tests.
//!
//! Objects are written through the same built-in `LayoutCatalog` the decoder
//! reads with, so the tests exercise real offsets rather than hand-placed
//! bytes.

#![allow(dead_code)]

use pyscope_core::layout::{LayoutCatalog, StructKind};
use pyscope_core::memory::SnapshotMemory;
use pyscope_core::object::{TPFLAGS_BYTES_SUBCLASS, TPFLAGS_UNICODE_SUBCLASS};
use pyscope_core::target::StaticTarget;
use pyscope_core::thread_state::{AUTO_TSS_KEY_PATH, RUNTIME_SYMBOL, RUNTIME_TYPE};
use pyscope_core::tls::TebTls;
use pyscope_core::types::{Address, ModuleInfo, ThreadInfo};
use pyscope_core::unicode::UnicodeState;
use pyscope_core::version::VersionFamily;

pub const HEAP_BASE: u64 = 0x10_0000;
pub const HEAP_SIZE: usize = 0x10_0000;
pub const MODULE_BASE: u64 = 0x7ff0_0000;
pub const AUTO_TSS_KEY_OFFSET: u64 = 0x248;

/// Bump-allocated interpreter heap for one version.
pub struct Heap
{
    pub catalog: LayoutCatalog,
    pub version: u32,
    memory: SnapshotMemory,
    next: u64,
    pub str_type: Address,
    pub bytes_type: Address,
    pub int_type: Address,
    pub runtime: Address,
}

impl Heap
{
    pub fn new(version: u32) -> Self
    {
        let catalog = LayoutCatalog::builtin(version).unwrap();
        let mut memory = SnapshotMemory::new();
        memory.add_region(Address::from(HEAP_BASE), vec![0; HEAP_SIZE]).unwrap();
        let mut heap = Self {
            catalog,
            version,
            memory,
            next: HEAP_BASE + 0x100,
            str_type: Address::ZERO,
            bytes_type: Address::ZERO,
            int_type: Address::ZERO,
            runtime: Address::ZERO,
        };
        heap.str_type = heap.type_object(TPFLAGS_UNICODE_SUBCLASS);
        heap.bytes_type = heap.type_object(TPFLAGS_BYTES_SUBCLASS);
        heap.int_type = heap.type_object(1 << 24);
        heap.runtime = heap.alloc(0x400);
        heap
    }

    pub fn family(&self) -> VersionFamily
    {
        self.catalog.family()
    }

    pub fn module_name(&self) -> String
    {
        format!("python{}.dll", self.version)
    }

    pub fn alloc(&mut self, size: u64) -> Address
    {
        let address = Address::from(self.next);
        self.next = (self.next + size.max(1) + 15) & !15;
        assert!(self.next <= HEAP_BASE + HEAP_SIZE as u64, "synthetic heap exhausted");
        address
    }

    pub fn write(&mut self, address: Address, bytes: &[u8])
    {
        self.memory.write(address, bytes).unwrap();
    }

    pub fn set(&mut self, kind: StructKind, object: Address, field: &str, value: u64)
    {
        let field = self.catalog.field(kind, field).unwrap();
        let bytes = value.to_le_bytes();
        self.write(object + field.offset, &bytes[..usize::from(field.size)]);
    }

    pub fn set_signed(&mut self, kind: StructKind, object: Address, field: &str, value: i64)
    {
        self.set(kind, object, field, value as u64);
    }

    pub fn set_pointer(&mut self, kind: StructKind, object: Address, field: &str, value: Address)
    {
        self.set(kind, object, field, value.value());
    }

    fn size_of(&self, kind: StructKind) -> u64
    {
        self.catalog.get(kind).unwrap().size()
    }

    fn type_object(&mut self, flags: u64) -> Address
    {
        let address = self.alloc(self.size_of(StructKind::TypeObject));
        self.set(StructKind::TypeObject, address, "tp_flags", flags);
        address
    }

    /// An object that is neither a string nor bytes.
    pub fn int_object(&mut self) -> Address
    {
        let object = self.alloc(self.size_of(StructKind::Object) + 8);
        self.set_pointer(StructKind::Object, object, "ob_type", self.int_type);
        object
    }

    pub fn bytes(&mut self, data: &[u8]) -> Address
    {
        let object = self.alloc(self.size_of(StructKind::Bytes) + data.len() as u64);
        self.set_pointer(StructKind::Object, object, "ob_type", self.bytes_type);
        self.set_signed(StructKind::Bytes, object, "ob_size", data.len() as i64);
        let sval = self.catalog.field(StructKind::Bytes, "ob_sval").unwrap().offset;
        self.write(object + sval, data);
        object
    }

    fn unicode_header(&mut self, size: u64, length: usize, state: UnicodeState) -> Address
    {
        let object = self.alloc(size);
        self.set_pointer(StructKind::Object, object, "ob_type", self.str_type);
        self.set_signed(StructKind::AsciiUnicode, object, "length", length as i64);
        self.set(StructKind::AsciiUnicode, object, "state", state.to_bits());
        object
    }

    /// A compact string in the narrowest kind that holds `text`.
    pub fn str_compact(&mut self, text: &str) -> Address
    {
        let kind = narrowest_kind(text);
        let ascii = text.is_ascii();
        let header = if ascii {
            self.size_of(StructKind::AsciiUnicode)
        } else {
            self.size_of(StructKind::CompactUnicode)
        };
        let data = encode_kind(text, kind);
        let length = text.chars().count();
        let state = UnicodeState {
            interned: 0,
            kind,
            compact: true,
            ascii,
            ready: true,
        };
        let object = self.unicode_header(header + data.len() as u64 + u64::from(kind), length, state);
        self.write(object + header, &data);
        object
    }

    /// A legacy (non-compact) ready string whose data lives in a separate
    /// buffer, stored with an explicit kind.
    pub fn str_legacy(&mut self, text: &str, kind: u8) -> Address
    {
        let data = encode_kind(text, kind);
        let state = UnicodeState {
            interned: 0,
            kind,
            compact: false,
            ascii: text.is_ascii(),
            ready: true,
        };
        let object = self.unicode_header(self.size_of(StructKind::Unicode), text.chars().count(), state);
        let buffer = self.alloc(data.len() as u64);
        self.write(buffer, &data);
        self.set_pointer(StructKind::Unicode, object, "data", buffer);
        object
    }

    /// A not-ready legacy string that only has its `wchar_t` buffer.
    pub fn str_wide(&mut self, text: &str) -> Address
    {
        let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let state = UnicodeState {
            interned: 0,
            kind: 0,
            compact: false,
            ascii: false,
            ready: false,
        };
        let object = self.unicode_header(self.size_of(StructKind::Unicode), 0, state);
        let buffer = self.alloc(units.len() as u64 + 2);
        self.write(buffer, &units);
        self.set_pointer(StructKind::AsciiUnicode, object, "wstr", buffer);
        self.set_signed(StructKind::CompactUnicode, object, "wstr_length", (units.len() / 2) as i64);
        object
    }

    /// A code object with a line table of the family's format.
    pub fn code(&mut self, filename: &str, name: &str, first_line: i64, table: &[u8]) -> Address
    {
        let filename = self.str_compact(filename);
        let name = self.str_compact(name);
        let table = self.bytes(table);
        self.code_with(filename, name, first_line, table)
    }

    pub fn code_with(&mut self, filename: Address, name: Address, first_line: i64, table: Address) -> Address
    {
        // room for inline bytecode on 3.11
        let code = self.alloc(self.size_of(StructKind::Code) + 0x200);
        self.set_pointer(StructKind::Object, code, "ob_type", self.int_type);
        self.set_signed(StructKind::Code, code, "co_firstlineno", first_line);
        self.set_pointer(StructKind::Code, code, "co_filename", filename);
        self.set_pointer(StructKind::Code, code, "co_name", name);
        let table_field = match self.family() {
            VersionFamily::Legacy => "co_lnotab",
            VersionFamily::V310 | VersionFamily::V311Plus => "co_linetable",
        };
        self.set_pointer(StructKind::Code, code, table_field, table);
        code
    }

    /// A frame executing `code` at byte offset `addrq`, linked to `back`.
    pub fn frame(&mut self, code: Address, back: Address, addrq: i64) -> Address
    {
        let frame = self.alloc(self.size_of(StructKind::Frame));
        self.set_pointer(StructKind::Frame, frame, "f_code", code);
        match self.family() {
            VersionFamily::Legacy => {
                self.set_pointer(StructKind::Frame, frame, "f_back", back);
                self.set_signed(StructKind::Frame, frame, "f_lasti", addrq);
            }
            VersionFamily::V310 => {
                self.set_pointer(StructKind::Frame, frame, "f_back", back);
                self.set_signed(StructKind::Frame, frame, "f_lasti", addrq / 2);
            }
            VersionFamily::V311Plus => {
                self.set_pointer(StructKind::Frame, frame, "previous", back);
                self.set_prev_instr(frame, code, addrq);
            }
        }
        frame
    }

    pub fn set_prev_instr(&mut self, frame: Address, code: Address, addrq: i64)
    {
        let bytecode = code + self.catalog.field(StructKind::Code, "co_code_adaptive").unwrap().offset;
        let prev_instr = Address::from(bytecode.value().wrapping_add(addrq as u64));
        self.set_pointer(StructKind::Frame, frame, "prev_instr", prev_instr);
    }

    /// Install a trace function on a legacy or 3.10 frame.
    pub fn set_trace(&mut self, frame: Address)
    {
        let trace = self.int_object();
        self.set_pointer(StructKind::Frame, frame, "f_trace", trace);
    }

    /// Store `f_lineno` on a legacy or 3.10 frame.
    pub fn set_frame_lineno(&mut self, frame: Address, line: i64)
    {
        self.set_signed(StructKind::Frame, frame, "f_lineno", line);
    }

    /// Give a 3.11 interpreter frame a frame object carrying `line`.
    pub fn attach_frame_object(&mut self, frame: Address, line: i64) -> Address
    {
        let frame_obj = self.alloc(self.size_of(StructKind::FrameObject));
        self.set_signed(StructKind::FrameObject, frame_obj, "f_lineno", line);
        self.set_pointer(StructKind::Frame, frame, "frame_obj", frame_obj);
        frame_obj
    }

    /// Chain frames for `(code, addrq)` pairs given outermost first; returns
    /// the innermost frame.
    pub fn chain(&mut self, frames: &[(Address, i64)]) -> Address
    {
        frames
            .iter()
            .fold(Address::ZERO, |back, (code, addrq)| self.frame(*code, back, *addrq))
    }

    /// A thread state whose current frame is `head`.
    pub fn thread_state(&mut self, head: Address) -> Address
    {
        let tstate = self.alloc(self.size_of(StructKind::ThreadState));
        match self.family() {
            VersionFamily::Legacy | VersionFamily::V310 => {
                self.set_pointer(StructKind::ThreadState, tstate, "frame", head);
            }
            VersionFamily::V311Plus => {
                let cframe = self.alloc(self.size_of(StructKind::CFrame));
                self.set_pointer(StructKind::CFrame, cframe, "current_frame", head);
                self.set_pointer(StructKind::ThreadState, tstate, "cframe", cframe);
            }
        }
        tstate
    }

    pub fn tss_key_address(&self) -> Address
    {
        self.runtime + AUTO_TSS_KEY_OFFSET
    }

    /// Initialise the GIL-state TSS key with `slot`.
    pub fn set_tss_key(&mut self, slot: u32)
    {
        let key = self.tss_key_address();
        self.set(StructKind::TssKey, key, "_is_initialized", 1);
        self.set(StructKind::TssKey, key, "_key", u64::from(slot));
    }

    /// A 64-bit TEB with `value` stored in `slot`.
    pub fn teb(&mut self, slot: u32, value: Address) -> Address
    {
        let tls = TebTls::TEB64;
        let teb = self.alloc(0x1800);
        if slot < 0x40 {
            self.write(teb + tls.slots_offset + u64::from(slot) * 8, &value.value().to_le_bytes());
        } else {
            let expansion = self.alloc(0x400 * 8);
            self.write(teb + tls.expansion_offset, &expansion.value().to_le_bytes());
            self.write(expansion + u64::from(slot - 0x40) * 8, &value.value().to_le_bytes());
        }
        teb
    }

    pub fn memory(&self) -> &SnapshotMemory
    {
        &self.memory
    }

    /// Freeze into a target with the runtime module and `threads`.
    pub fn into_target(self, threads: Vec<ThreadInfo>) -> StaticTarget
    {
        let module = self.module_name();
        let offset = self.tss_key_address().value() - self.runtime.value();
        let mut target = StaticTarget::new(self.memory)
            .with_module(ModuleInfo::new(r"C:\Windows\System32\kernel32.dll", 0x7ffa_0000u64))
            .with_module(ModuleInfo::new(format!(r"C:\Python\{module}"), MODULE_BASE))
            .with_symbol(format!(r"C:\Python\{module}"), RUNTIME_SYMBOL, self.runtime)
            .with_field_offset(format!(r"C:\Python\{module}"), RUNTIME_TYPE, AUTO_TSS_KEY_PATH, offset);
        for thread in threads {
            target = target.with_thread(thread);
        }
        target
    }
}

pub fn narrowest_kind(text: &str) -> u8
{
    match text.chars().map(u32::from).max().unwrap_or(0) {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        _ => 4,
    }
}

pub fn encode_kind(text: &str, kind: u8) -> Vec<u8>
{
    text.chars()
        .flat_map(|c| {
            let bytes = u32::from(c).to_le_bytes();
            bytes[..usize::from(kind)].to_vec()
        })
        .collect()
}

/// Encode `(range length, line delta)` entries.
pub fn table(entries: &[(u8, i8)]) -> Vec<u8>
{
    entries
        .iter()
        .flat_map(|(length, delta)| [*length, delta.to_le_bytes()[0]])
        .collect()
}
