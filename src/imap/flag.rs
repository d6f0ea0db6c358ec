use std::fmt::Display;

use enumflags2::{BitFlags, bitflags};

/// System flags a message can carry when it is appended.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Flag {
    Seen,
    Deleted,
}

impl Flag {
    /// Parenthesized flag list for APPEND/STORE, e.g. `(\Seen \Deleted)`.
    pub fn list(flags: BitFlags<Self>) -> String {
        let names: Vec<String> = flags.iter().map(|flag| flag.to_string()).collect();
        format!("({})", names.join(" "))
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Seen => write!(f, r"\Seen"),
            Flag::Deleted => write!(f, r"\Deleted"),
        }
    }
}
