use core::fmt;
use core::num::NonZeroU32;

/// Declare a compact, typed arena index.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Id>` to be pointer-optimized
/// - each arena gets its own type, so a `SignalId` can never index blocks
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create an ID from a 0-based arena index by storing index+1.
            pub fn from_index(index: usize) -> Self {
                let raw = u32::try_from(index + 1).expect("arena index fits in u32");
                // index+1 is nonzero
                Self(NonZeroU32::new(raw).expect("index+1 is nonzero"))
            }

            /// Recover the 0-based arena index.
            pub fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "({})"), self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index())
            }
        }
    };
}

define_id!(
    /// Index of a signal (wire) in a model's signal arena.
    SignalId,
    "SignalId"
);
define_id!(
    /// Index of an operator block in a model's block arena.
    BlockId,
    "BlockId"
);
define_id!(
    /// Index of a registered breakpoint set.
    BreakpointId,
    "BreakpointId"
);
define_id!(
    /// Index of a registered gridded function table.
    TableId,
    "TableId"
);
