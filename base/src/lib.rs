//! The `base` crate defines the HP 2100 / HP 1000 related things
//! which are useful in both a simulator and other associated tools.
//! The idea is that if you want to write an assembler or a
//! disassembler, it would depend on the base crate but would not
//! need to depend on the simulator library itself.

mod types;

pub mod instruction;
pub mod prelude;

/// Construct a [`prelude::SelectCode`] from a constant, checking
/// the range at compile time.
#[macro_export]
macro_rules! sc {
    ($n:expr) => {
        $crate::prelude::SelectCode::new::<{ $n }>()
    };
}

/// Construct a [`prelude::LogicalAddress`] from a constant, checking
/// the range at compile time.
#[macro_export]
macro_rules! la {
    ($n:expr) => {
        $crate::prelude::LogicalAddress::new::<{ $n }>()
    };
}

#[test]
fn test_sc() {
    use prelude::SelectCode;
    let m: SelectCode = sc!(0o12);
    let n: SelectCode = SelectCode::try_from(0o12_u8).expect("test data should be in range");
    assert_eq!(m, n);
}

#[test]
fn test_la() {
    use prelude::LogicalAddress;
    let p: LogicalAddress = la!(0o77_777);
    assert_eq!(p, LogicalAddress::MAX);
}
