//! Span 单元测试

use crate::util::span::{FileId, Position, Span};

#[test]
fn test_position_creation() {
    let pos = Position::new(1, 5);
    assert_eq!(pos.line, 1);
    assert_eq!(pos.column, 5);
    assert_eq!(pos.offset, 0);
}

#[test]
fn test_dummy_span_display() {
    let span = Span::dummy();
    assert!(span.is_dummy());
    assert_eq!(span.to_string(), "<unknown>");
}

#[test]
fn test_span_display_includes_file() {
    let span = Span::line(FileId(2), 3, 1, 9);
    assert_eq!(span.to_string(), "#2[3:1 - 3:9]");
}

#[test]
fn test_span_merge_same_file() {
    let a = Span::line(FileId(0), 1, 4, 8);
    let b = Span::line(FileId(0), 2, 1, 3);
    let merged = a.merge(b);
    assert_eq!(merged.start, Position::new(1, 4));
    assert_eq!(merged.end, Position::new(2, 3));
}

#[test]
fn test_span_merge_ignores_other_file_and_dummy() {
    let a = Span::line(FileId(0), 1, 4, 8);
    let b = Span::line(FileId(1), 2, 1, 3);
    assert_eq!(a.merge(b), a);
    assert_eq!(Span::dummy().merge(a), a);
    assert_eq!(a.merge(Span::dummy()), a);
}
