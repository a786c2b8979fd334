//! Crate-wide error type.

use core::fmt;

/// An error raised by this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The slave at the given id is not an Elmo Platinum drive.
    Identity {
        /// Expected Elmo vendor id.
        expected_vendor: u32,
        /// Expected EPD product code.
        expected_product: u32,
        /// Vendor id actually reported by the slave descriptor.
        got_vendor: u32,
        /// Product code actually reported by the slave descriptor.
        got_product: u32,
    },
    /// A host-supplied configuration value violates an invariant.
    Config(&'static str),
    /// An SDO operation failed during startup.
    Sdo {
        /// Object index of the failed SDO access.
        index: u16,
        /// Sub-index of the failed SDO access.
        sub_index: u8,
        /// Transport-reported cause.
        source: crate::sdo::SdoError,
    },
    /// A PDO byte buffer did not match the expected frame size.
    PdoLength {
        /// Size the codec expects.
        expected: usize,
        /// Size actually supplied.
        got: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Identity {
                expected_vendor,
                expected_product,
                got_vendor,
                got_product,
            } => write!(
                f,
                "slave identity mismatch: expected vendor {:#010x} product {:#010x}, got vendor {:#010x} product {:#010x}",
                expected_vendor, expected_product, got_vendor, got_product
            ),
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Error::Sdo {
                index,
                sub_index,
                source,
            } => write!(
                f,
                "SDO access to {:#06x}:{} failed: {}",
                index, sub_index, source
            ),
            Error::PdoLength { expected, got } => {
                write!(f, "PDO buffer length {} does not match expected {}", got, expected)
            }
        }
    }
}

impl std::error::Error for Error {}
