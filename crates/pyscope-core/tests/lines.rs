//! Tests for frame line resolution across version families

mod common;

use common::{table, Heap};
use pyscope_core::layout::StructKind;
use pyscope_core::lines::{lnotab, LineAlgorithm, LineResolver, RangeCursor, ScanRules};
use pyscope_core::types::{Address, LineNumber};

const MAX_TABLE: usize = 1 << 20;

fn frame_line(heap: &Heap, frame: Address, code: Address) -> LineNumber
{
    LineResolver::new(heap.memory(), &heap.catalog, MAX_TABLE)
        .frame_line(frame, code)
        .unwrap()
}

/// Small deterministic generator so property checks are reproducible.
struct Lcg(u64);

impl Lcg
{
    fn next(&mut self) -> u64
    {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn pairs(&mut self, count: usize) -> Vec<(u8, i8)>
    {
        (0..count)
            .map(|_| ((self.next() % 12) as u8, (self.next() % 9) as i8 - 3))
            .collect()
    }
}

#[test]
fn test_lnotab_matches_forward_simulation()
{
    let mut rng = Lcg(7);
    for _ in 0..50 {
        let pairs = rng.pairs(12);
        let blob = table(&pairs);
        let max_addr: i64 = pairs.iter().map(|(addr, _)| i64::from(*addr)).sum();

        for addrq in 0..=max_addr {
            let mut expected = 100;
            let mut addr = 0;
            for (addr_delta, line_delta) in &pairs {
                addr += i64::from(*addr_delta);
                if addr > addrq {
                    break;
                }
                expected += i64::from(*line_delta);
            }
            assert_eq!(lnotab::addr2line(&blob, 100, addrq), expected, "addrq {addrq} in {pairs:?}");
        }

        let final_line = 100 + pairs.iter().map(|(_, line)| i64::from(*line)).sum::<i64>();
        assert_eq!(lnotab::addr2line(&blob, 100, max_addr), final_line);
    }
}

#[test]
fn test_range_cursor_scan_symmetry()
{
    let mut rng = Lcg(11);
    for _ in 0..50 {
        let mut pairs = rng.pairs(10);
        // keep the first range non-empty so the cursor has somewhere to stop
        pairs[0].0 = pairs[0].0.max(1);
        let blob = table(&pairs);

        let mut cursor = RangeCursor::new(&blob, 1);
        assert!(cursor.next_range(true).unwrap());
        loop {
            let before = cursor.range();
            let mut probe = cursor.clone();
            if !probe.next_range(true).unwrap_or(false) {
                break;
            }
            assert!(probe.previous_range(true).unwrap());
            assert_eq!(probe.range(), before, "in {pairs:?}");
            cursor.next_range(true).unwrap();
        }
    }
}

#[test]
fn test_range_variants_agree_on_boundaries()
{
    // No empty ranges, so the retreat difference never shows.
    let blob = table(&[(6, 1), (4, 2), (2, -128), (8, -1), (10, 5)]);
    let boundaries = [0, 5, 6, 9, 10, 11, 12, 19, 20, 29];
    for addrq in boundaries {
        assert_eq!(
            LineAlgorithm::RangeTable310.addr2line(&blob, 10, addrq),
            LineAlgorithm::RangeTable311.addr2line(&blob, 10, addrq),
            "addrq {addrq}"
        );
    }
    assert_eq!(LineAlgorithm::RangeTable310.addr2line(&blob, 10, 10).unwrap(), -1);
    assert_eq!(LineAlgorithm::RangeTable311.addr2line(&blob, 10, 12).unwrap(), 12);
}

#[test]
fn test_range_past_table_end_is_unknown()
{
    let blob = table(&[(4, 1)]);
    assert!(LineAlgorithm::RangeTable310.addr2line(&blob, 1, 4).is_err());
}

#[test]
fn test_legacy_frame_computes_from_lasti()
{
    let mut heap = Heap::new(38);
    let code = heap.code("app.py", "run", 20, &table(&[(0, 1), (8, 3), (6, -2)]));
    let frame = heap.frame(code, Address::ZERO, 10);
    heap.set_frame_lineno(frame, 99);
    // f_lineno is stale while no trace function is installed
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(24));
}

#[test]
fn test_legacy_traced_frame_uses_f_lineno()
{
    let mut heap = Heap::new(39);
    let code = heap.code("app.py", "run", 20, &table(&[(0, 1), (8, 3)]));
    let frame = heap.frame(code, Address::ZERO, 10);
    heap.set_frame_lineno(frame, 57);
    heap.set_trace(frame);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(57));
}

#[test]
fn test_legacy_lnotab_accepts_minus_128()
{
    let mut heap = Heap::new(37);
    let code = heap.code("big.py", "far", 300, &table(&[(2, -128)]));
    let frame = heap.frame(code, Address::ZERO, 4);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(172));
}

#[test]
fn test_310_frame_scales_lasti_by_code_unit()
{
    let mut heap = Heap::new(310);
    let code = heap.code("app.py", "run", 5, &table(&[(4, 1), (4, 1), (4, 1)]));
    // byte offset 8 is instruction index 4
    let frame = heap.frame(code, Address::ZERO, 8);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(8));
}

#[test]
fn test_310_prefers_nonzero_f_lineno()
{
    let mut heap = Heap::new(310);
    let code = heap.code("app.py", "run", 5, &table(&[(4, 1)]));
    let frame = heap.frame(code, Address::ZERO, 0);
    heap.set_frame_lineno(frame, 77);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(77));
}

#[test]
fn test_310_artifact_range_is_unknown()
{
    let mut heap = Heap::new(310);
    let code = heap.code("app.py", "run", 5, &table(&[(4, 1), (4, -128)]));
    let frame = heap.frame(code, Address::ZERO, 6);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Unknown);
}

#[test]
fn test_311_uses_prev_instr_offset()
{
    let mut heap = Heap::new(311);
    let code = heap.code("mod.py", "<module>", 1, &table(&[(2, 0), (6, 2), (10, 3)]));
    for (addrq, line) in [(0, 1), (1, 1), (2, 3), (7, 3), (8, 6), (17, 6)] {
        let frame = heap.frame(code, Address::ZERO, addrq);
        assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(line), "addrq {addrq}");
    }
}

#[test]
fn test_311_prefers_frame_object_line()
{
    let mut heap = Heap::new(311);
    let code = heap.code("mod.py", "f", 1, &table(&[(8, 0)]));
    let frame = heap.frame(code, Address::ZERO, 2);
    heap.attach_frame_object(frame, 42);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(42));
}

#[test]
fn test_311_zero_frame_object_line_falls_back_to_table()
{
    let mut heap = Heap::new(311);
    let code = heap.code("mod.py", "f", 10, &table(&[(8, 1)]));
    let frame = heap.frame(code, Address::ZERO, 2);
    heap.attach_frame_object(frame, 0);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(11));
}

#[test]
fn test_311_instruction_before_bytecode_is_first_line()
{
    let mut heap = Heap::new(311);
    let code = heap.code("mod.py", "f", 10, &table(&[(8, 1)]));
    // prev_instr starts one code unit before the first instruction
    let frame = heap.frame(code, Address::ZERO, -2);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(10));
}

#[test]
fn test_311_retreat_is_single_step()
{
    let blob = table(&[(4, 1), (0, 2), (4, 3)]);

    let rules = ScanRules::V311;
    let mut cursor = RangeCursor::new(&blob, 0);
    cursor.next_range(rules.skip_empty_forward).unwrap();
    cursor.next_range(rules.skip_empty_forward).unwrap();
    assert_eq!(cursor.range(), (4, 8, 6));
    assert!(cursor.previous_range(rules.skip_empty_backward).unwrap());
    assert_eq!(cursor.range(), (4, 4, 3));

    let rules = ScanRules::V310;
    let mut cursor = RangeCursor::new(&blob, 0);
    cursor.next_range(rules.skip_empty_forward).unwrap();
    cursor.next_range(rules.skip_empty_forward).unwrap();
    assert!(cursor.previous_range(rules.skip_empty_backward).unwrap());
    assert_eq!(cursor.range(), (0, 4, 1));
}

#[test]
fn test_empty_table_is_first_line_for_every_family()
{
    for version in [37, 39, 310, 311] {
        let mut heap = Heap::new(version);
        let code = heap.code("empty.py", "f", 33, &[]);
        let frame = heap.frame(code, Address::ZERO, 6);
        assert_eq!(frame_line(&heap, frame, code), LineNumber::Known(33), "version {version}");
    }
}

#[test]
fn test_non_bytes_table_is_unknown()
{
    let mut heap = Heap::new(310);
    let filename = heap.str_compact("a.py");
    let name = heap.str_compact("f");
    let not_bytes = heap.str_compact("\x04\x01");
    let code = heap.code_with(filename, name, 3, not_bytes);
    let frame = heap.frame(code, Address::ZERO, 2);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Unknown);
}

#[test]
fn test_null_or_unreadable_table_is_unknown()
{
    let mut heap = Heap::new(39);
    let code = heap.code("a.py", "f", 3, &table(&[(4, 1)]));
    let frame = heap.frame(code, Address::ZERO, 2);

    heap.set_pointer(StructKind::Code, code, "co_lnotab", Address::ZERO);
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Unknown);

    heap.set_pointer(StructKind::Code, code, "co_lnotab", Address::from(0x10));
    assert_eq!(frame_line(&heap, frame, code), LineNumber::Unknown);
}

#[test]
fn test_oversized_table_is_unknown()
{
    let mut heap = Heap::new(310);
    let code = heap.code("a.py", "f", 3, &table(&[(4, 1), (4, 1)]));
    let frame = heap.frame(code, Address::ZERO, 2);
    let line = LineResolver::new(heap.memory(), &heap.catalog, 3)
        .frame_line(frame, code)
        .unwrap();
    assert_eq!(line, LineNumber::Unknown);
}

#[test]
fn test_unreadable_frame_is_surfaced()
{
    let heap = Heap::new(310);
    let result =
        LineResolver::new(heap.memory(), &heap.catalog, MAX_TABLE).frame_line(Address::from(0x20), Address::from(0x20));
    assert!(result.is_err());
}
