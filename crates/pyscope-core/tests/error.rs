//! Tests for error handling

use pyscope_core::error::{InspectError, InspectResult};
use pyscope_core::types::{Address, ThreadId};

#[test]
fn test_error_no_interpreter()
{
    let error = InspectError::NoInterpreterFound;
    assert!(error.to_string().contains("No Python interpreter"));
}

#[test]
fn test_error_ambiguous_interpreter_lists_candidates()
{
    let error = InspectError::AmbiguousInterpreter(vec!["python39.dll (39)".into(), "python311.dll (311)".into()]);
    let message = error.to_string();
    assert!(message.contains("python39.dll (39), python311.dll (311)"));
}

#[test]
fn test_error_unsupported_version()
{
    let error = InspectError::UnsupportedVersion(312);
    assert!(error.to_string().contains("312"));
}

#[test]
fn test_error_unreadable_memory()
{
    let error = InspectError::UnreadableMemory {
        address: Address::new(0x1000),
        len: 8,
    };
    let message = error.to_string();
    assert!(message.contains("8 bytes"));
    assert!(message.contains("0x0000000000001000"));
}

#[test]
fn test_error_not_attached_thread()
{
    let error = InspectError::NotAttachedThread(ThreadId(77));
    assert_eq!(error.to_string(), "Thread 77 is not attached to the interpreter");
}

#[test]
fn test_error_frame_chain()
{
    let too_long = InspectError::FrameChainTooLong { limit: 1024 };
    assert!(too_long.to_string().contains("1024"));

    let cycle = InspectError::SuspectedCycle {
        address: Address::new(0xabc),
    };
    assert!(cycle.to_string().contains("0x0000000000000abc"));
}

#[test]
fn test_error_symbol_not_found()
{
    let error = InspectError::SymbolNotFound {
        module: "python39.dll".into(),
        symbol: "_PyRuntime".into(),
    };
    assert_eq!(error.to_string(), "Symbol not found: python39.dll!_PyRuntime");
}

#[test]
fn test_error_corrupt_object()
{
    let error = InspectError::CorruptObject {
        address: Address::new(0x40),
        reason: "negative length".into(),
    };
    assert!(error.to_string().ends_with("negative length"));
}

#[test]
fn test_error_tls_slot()
{
    let error = InspectError::TlsSlotOutOfRange(0x440);
    assert!(error.to_string().contains("1088"));
}

#[test]
fn test_result_type()
{
    fn returns_ok() -> InspectResult<i32>
    {
        Ok(42)
    }

    fn returns_err() -> InspectResult<i32>
    {
        Err(InspectError::InvalidArgument("test".to_string()))
    }

    assert_eq!(returns_ok().unwrap(), 42);
    assert!(returns_err().is_err());
}

#[test]
fn test_errors_compare_by_value()
{
    assert_eq!(InspectError::UnsupportedVersion(36), InspectError::UnsupportedVersion(36));
    assert_ne!(
        InspectError::MismatchedLayout("a".into()),
        InspectError::MalformedLineTable("a".into())
    );
    let cloned = InspectError::NoInterpreterFound.clone();
    assert_eq!(cloned, InspectError::NoInterpreterFound);
}
