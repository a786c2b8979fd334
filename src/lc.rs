//! Elmo "Letter Command" mnemonic → CANopen object index resolver.
//!
//! The table must stay in strict ASCII order for [`to_object_index`]'s
//! binary search to be correct.

/// One letter-command mnemonic paired with its object dictionary index.
struct LcEntry {
    mnemonic: &'static str,
    index: u16,
}

const LC_TABLE: &[LcEntry] = &[
    LcEntry { mnemonic: "AC", index: 0x300C },
    LcEntry { mnemonic: "BP", index: 0x303D },
    LcEntry { mnemonic: "CA", index: 0x3052 },
    LcEntry { mnemonic: "CL", index: 0x305D },
    LcEntry { mnemonic: "DC", index: 0x3078 },
    LcEntry { mnemonic: "ER", index: 0x30AB },
    LcEntry { mnemonic: "HL", index: 0x3111 },
    LcEntry { mnemonic: "LL", index: 0x31A1 },
    LcEntry { mnemonic: "MC", index: 0x31BC },
    LcEntry { mnemonic: "PL", index: 0x3231 },
    LcEntry { mnemonic: "SF", index: 0x3297 },
    LcEntry { mnemonic: "UM", index: 0x32E6 },
];

/// Resolve a two-letter Elmo letter command to its object dictionary index.
///
/// Returns `0x0000` if `mnemonic` is not a recognised command.
pub fn to_object_index(mnemonic: &str) -> u16 {
    LC_TABLE
        .binary_search_by(|entry| entry.mnemonic.cmp(mnemonic))
        .map(|i| LC_TABLE[i].index)
        .unwrap_or(0x0000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted() {
        for pair in LC_TABLE.windows(2) {
            assert!(pair[0].mnemonic < pair[1].mnemonic);
        }
    }

    #[test]
    fn resolves_every_known_mnemonic() {
        let expected: &[(&str, u16)] = &[
            ("AC", 0x300C),
            ("BP", 0x303D),
            ("CA", 0x3052),
            ("CL", 0x305D),
            ("DC", 0x3078),
            ("ER", 0x30AB),
            ("HL", 0x3111),
            ("LL", 0x31A1),
            ("MC", 0x31BC),
            ("PL", 0x3231),
            ("SF", 0x3297),
            ("UM", 0x32E6),
        ];

        for (mnemonic, index) in expected {
            assert_eq!(to_object_index(mnemonic), *index, "{mnemonic}");
        }
    }

    #[test]
    fn unknown_mnemonic_resolves_to_zero() {
        assert_eq!(to_object_index("ZZ"), 0x0000);
        assert_eq!(to_object_index("AB"), 0x0000);
        assert_eq!(to_object_index(""), 0x0000);
    }
}
