//! Testing of the numeric encoding of [`ErrorKind`].

use shared::ErrorKind;

#[test]
fn test_error_kind_numbers() {
    for kind in ErrorKind::ALL {
        assert_ne!(kind.to_num(), 0, "Zero is reserved for success");
        assert_eq!(ErrorKind::from_num(kind.to_num()), Some(kind));
    }
    assert_eq!(ErrorKind::OutOfMemory.to_num(), 1);
    assert_eq!(ErrorKind::TaskTableFull.to_num(), 4);
}

#[test]
fn test_unknown_error_numbers() {
    assert_eq!(ErrorKind::from_num(0), None);
    assert_eq!(ErrorKind::from_num(5), None);
    assert_eq!(ErrorKind::from_num(u32::MAX), None);
}

#[test]
fn test_error_kind_display() {
    assert_eq!(ErrorKind::OutOfMemory.to_string(), "Out of memory");
    assert_eq!(ErrorKind::TaskTableFull.to_string(), "Task table is full");
}
