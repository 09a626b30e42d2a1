//! Diagnostics, reporting masks, and errors.

use sigil_foundation::{Diagnostics, Error, ErrorContext, ErrorKind, ErrorLevel, Type};

#[test]
fn masks_filter_levels() {
    let mut diag = Diagnostics::with_reporting(ErrorLevel::ALL);
    let previous = diag.set_reporting(ErrorLevel::from_bits(
        ErrorLevel::ALL.bits() & !ErrorLevel::NOTICE.bits(),
    ));
    assert_eq!(previous, ErrorLevel::ALL);

    diag.notice("hidden");
    diag.warning("shown");
    assert_eq!(diag.len(), 1);
    assert_eq!(diag.entries()[0].message, "shown");

    diag.set_reporting(ErrorLevel::NONE);
    diag.warning("also hidden");
    assert_eq!(diag.len(), 1);
}

#[test]
fn drain_returns_only_new_entries() {
    let mut diag = Diagnostics::new();
    diag.warning("one");
    assert_eq!(diag.drain_new().len(), 1);
    assert!(!diag.has_new());
    diag.warning("two");
    assert_eq!(diag.drain_new()[0].message, "two");
    assert_eq!(diag.take().len(), 2);
    assert!(diag.is_empty());
}

#[test]
fn levels_have_names() {
    assert_eq!(ErrorLevel::WARNING.name(), Some("E_WARNING"));
    assert!(ErrorLevel::ALL.contains(ErrorLevel::USER_NOTICE));
    assert!(ErrorLevel::ERROR.is_error());
    assert!(!ErrorLevel::WARNING.is_error());
}

#[test]
fn error_messages() {
    assert_eq!(Error::new(ErrorKind::DivisionByZero).kind.to_string(), "division by zero");
    assert_eq!(
        Error::type_mismatch(Type::Int, Type::Array).kind.to_string(),
        "type mismatch: expected int, got array"
    );
    assert!(Error::new(ErrorKind::Cancelled).is_cancelled());
    assert!(!Error::fatal("boom").is_cancelled());
}

#[test]
fn context_records_frames() {
    let context = ErrorContext::new()
        .with_source("script.php")
        .with_position(3, 7)
        .with_frame("inner")
        .with_frame("main");
    let err = Error::fatal("boom").with_context(context);
    let context = err.context.as_ref().unwrap();
    assert_eq!(context.stack, vec!["inner".to_string(), "main".to_string()]);
}
