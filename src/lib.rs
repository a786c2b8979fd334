//! Cyclic CiA-402 driver for the Elmo Platinum (EPD) EtherCAT servo drive.
//!
//! This crate is the slave-side driver only: it ingests a TxPDO each fieldbus
//! cycle, decodes it into [`telemetry::State`], runs the CiA-402 state
//! machine, and produces an RxPDO for the master to write back to the bus.
//! Bus discovery, distributed clocks, and the mailbox/SDO transport itself
//! are external collaborators, represented here by the [`sdo`], [`emcy`] and
//! [`clock`] traits.
//!
//! Module map, leaves first:
//!
//! - [`lc`] — Elmo Letter Command mnemonic → object index resolver.
//! - [`pdo`] — RxPDO/TxPDO wire layout and controlword/statusword bitfields.
//! - [`sdo`] — blocking SDO transport seam.
//! - [`emcy`] — per-slave emergency queue seam.
//! - [`clock`] — monotonic/wall-clock time seam.
//! - [`config`] — host-supplied drive configuration.
//! - [`telemetry`] — public per-cycle state snapshot.
//! - [`motion`] — mode-of-operation dispatcher and motion command union.
//! - [`state_machine`] — CiA-402 state tracker.
//! - [`startup`] — one-shot pre-op → safe-op startup configurator.
//! - [`drive`] — public API (`Epd`).

// This mod MUST go first, so that the others see its macros.
pub(crate) mod log;

pub mod clock;
pub mod config;
pub mod drive;
pub mod emcy;
pub mod error;
pub mod lc;
pub mod motion;
pub mod pdo;
pub mod sdo;
pub mod startup;
pub mod state_machine;
pub mod telemetry;

pub use config::Configuration;
pub use drive::Epd;
pub use error::Error;
pub use telemetry::State;

/// Elmo's EtherCAT vendor id, checked against the slave descriptor on init.
pub const JSD_ELMO_VENDOR_ID: u32 = 0x0000009a;

/// Elmo Platinum product code, checked against the slave descriptor on init.
pub const JSD_EPD_PRODUCT_CODE: u32 = 0x00030924;

/// Number of digital input bits exposed in [`telemetry::State::digital_inputs`].
pub const NUM_DIGITAL_INPUTS: usize = 6;

/// Number of digital output bits settable via [`drive::Epd::set_digital_output`].
pub const NUM_DIGITAL_OUTPUTS: usize = 6;

/// Cap on emergency-queue pops per cycle while recovering from FAULT.
pub const MAX_ERROR_POPS_PER_CYCLE: usize = 5;

/// Minimum interval between accepted `reset()` calls.
pub const RESET_DERATE_SEC: f64 = 1.0;

/// Time a FAULT is held waiting for a matching EMCY before giving up.
pub const FAULT_EMCY_TIMEOUT_SEC: f64 = 1.0;
