//! Public API (§4.7): the `Epd` slave handle.

use crate::clock::Clock;
use crate::config::Configuration;
use crate::emcy::EmergencyQueue;
use crate::error::Error;
use crate::motion::{CspCommand, MotionCommand};
use crate::pdo::{RxPdo, StateMachineState, TxPdo};
use crate::sdo::SdoTransport;
use crate::state_machine::{self, PendingCommands, Timestamps};
use crate::telemetry::{self, State};
use crate::{JSD_ELMO_VENDOR_ID, JSD_EPD_PRODUCT_CODE, NUM_DIGITAL_OUTPUTS};

/// A single Elmo Platinum EtherCAT slave.
///
/// Owns the last TxPDO, the RxPDO staged for the next cycle, the public
/// telemetry snapshot, and the private state machine bookkeeping (§3). Every
/// public method checks the slave's reported identity first; a mismatch is
/// an `Error::Identity` that the bus master must treat as an init failure.
#[derive(Debug)]
pub struct Epd {
    vendor_id: u32,
    product_code: u32,
    config: Configuration,
    motor_rated_current_ma: u32,
    last_txpdo: TxPdo,
    next_rxpdo: RxPdo,
    state: State,
    commands: PendingCommands,
    timestamps: Timestamps,
    motion_command: MotionCommand,
    was_fault: bool,
}

impl Epd {
    /// Run the Startup Configurator and build the slave handle.
    ///
    /// `vendor_id`/`product_code` are the values reported by the slave
    /// descriptor at bus enumeration; they are checked against
    /// [`JSD_ELMO_VENDOR_ID`]/[`JSD_EPD_PRODUCT_CODE`] once here and again on
    /// every cyclic call.
    pub fn new(
        vendor_id: u32,
        product_code: u32,
        config: Configuration,
        transport: &mut dyn SdoTransport,
    ) -> Result<Self, Error> {
        check_identity(vendor_id, product_code)?;
        let motor_rated_current_ma = crate::startup::configure(&config, transport)?;

        Ok(Self {
            vendor_id,
            product_code,
            config,
            motor_rated_current_ma,
            last_txpdo: TxPdo::default(),
            next_rxpdo: RxPdo::default(),
            state: State::default(),
            commands: PendingCommands::default(),
            timestamps: Timestamps::default(),
            motion_command: MotionCommand::None,
            was_fault: false,
        })
    }

    fn check_identity(&self) -> Result<(), Error> {
        check_identity(self.vendor_id, self.product_code)
    }

    /// Ingest one cycle's TxPDO bytes and refresh the public telemetry.
    ///
    /// Must be called once per cycle, before any command setters or
    /// [`Epd::process`].
    pub fn read(&mut self, txpdo_bytes: &[u8], clock: &dyn Clock) -> Result<(), Error> {
        self.check_identity()?;
        self.last_txpdo = TxPdo::decode(txpdo_bytes)?;

        let observed = StateMachineState::from_statusword(self.last_txpdo.statusword);
        let entered_fault = matches!(observed, Some(StateMachineState::Fault)) && !self.was_fault;
        if entered_fault {
            state_machine::enter_fault(&mut self.timestamps, clock);
        }
        self.was_fault = matches!(observed, Some(StateMachineState::Fault));

        self.state = telemetry::decode(
            &self.last_txpdo,
            &self.next_rxpdo,
            self.motor_rated_current_ma,
            self.state.emcy_error_code,
        );

        Ok(())
    }

    /// Run the State Machine Core and stage the next RxPDO.
    ///
    /// Must be called once per cycle, after [`Epd::read`] and after any
    /// command setters for this cycle.
    pub fn process(&mut self, emcy_queue: &mut dyn EmergencyQueue, clock: &dyn Clock) -> Result<(), Error> {
        self.check_identity()?;

        let observed = StateMachineState::from_statusword(self.last_txpdo.statusword)
            .unwrap_or_else(|| unreachable!("unknown CiA-402 state in statusword"));

        if let Some(code) = state_machine::run(
            observed,
            &mut self.commands,
            &mut self.timestamps,
            &self.motion_command,
            self.motor_rated_current_ma,
            emcy_queue,
            clock,
            &mut self.next_rxpdo,
        ) {
            self.state.emcy_error_code = code;
        }

        Ok(())
    }

    /// Read-only reference to the public telemetry snapshot, stable until
    /// the next [`Epd::read`].
    pub fn get_state(&self) -> &State {
        &self.state
    }

    /// Bytes to write back to the bus this cycle.
    pub fn rxpdo_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; crate::pdo::RXPDO_LEN];
        self.next_rxpdo.encode(&mut buf)?;
        Ok(buf)
    }

    /// Raise the `reset()` edge flag, subject to [`crate::RESET_DERATE_SEC`]
    /// rate limiting.
    pub fn reset(&mut self, clock: &dyn Clock) -> Result<(), Error> {
        self.check_identity()?;
        if state_machine::request_reset(&mut self.timestamps, clock) {
            self.commands.new_reset = true;
        }
        Ok(())
    }

    /// Raise the `halt()` edge flag.
    pub fn halt(&mut self) -> Result<(), Error> {
        self.check_identity()?;
        self.commands.new_halt_command = true;
        Ok(())
    }

    /// Stage a CSP motion command for the next [`Epd::process`].
    pub fn set_motion_command_csp(&mut self, cmd: CspCommand) -> Result<(), Error> {
        self.check_identity()?;
        self.motion_command = MotionCommand::Csp(cmd);
        self.commands.new_motion_command = true;
        Ok(())
    }

    /// Set or clear digital output `index` (bit `16 + index` of RxPDO
    /// `digital_outputs`). `index` must be `< NUM_DIGITAL_OUTPUTS`.
    pub fn set_digital_output(&mut self, index: usize, on: bool) -> Result<(), Error> {
        self.check_identity()?;
        if index >= NUM_DIGITAL_OUTPUTS {
            return Err(Error::Config("digital output index out of range"));
        }
        let bit = 1u32 << (16 + index);
        if on {
            self.next_rxpdo.digital_outputs |= bit;
        } else {
            self.next_rxpdo.digital_outputs &= !bit;
        }
        Ok(())
    }

    /// Set RxPDO `max_current` from a peak current in amps.
    pub fn set_peak_current(&mut self, amps: f64) -> Result<(), Error> {
        self.check_identity()?;
        self.next_rxpdo.max_current = (amps * 1e6 / self.motor_rated_current_ma as f64) as u16;
        Ok(())
    }

    /// Host-supplied configuration this slave was built with.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }
}

fn check_identity(vendor_id: u32, product_code: u32) -> Result<(), Error> {
    if vendor_id != JSD_ELMO_VENDOR_ID || product_code != JSD_EPD_PRODUCT_CODE {
        return Err(Error::Identity {
            expected_vendor: JSD_ELMO_VENDOR_ID,
            expected_product: JSD_EPD_PRODUCT_CODE,
            got_vendor: vendor_id,
            got_product: product_code,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emcy::EmcyEntry;
    use crate::sdo::{SdoError, SdoValue};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FixedClock {
        monotonic: f64,
        wall: f64,
    }

    impl Clock for FixedClock {
        fn monotonic_now(&self) -> f64 {
            self.monotonic
        }
        fn wall_now(&self) -> f64 {
            self.wall
        }
    }

    struct EmptyQueue;
    impl EmergencyQueue for EmptyQueue {
        fn pop(&mut self) -> Option<EmcyEntry> {
            None
        }
    }

    struct FakeTransport {
        gets: HashMap<(u16, u8), SdoValue>,
    }

    impl SdoTransport for FakeTransport {
        fn set(&mut self, _index: u16, _sub_index: u8, _value: SdoValue) -> Result<(), SdoError> {
            Ok(())
        }
        fn set_complete_access(&mut self, _index: u16, _bytes: &[u8]) -> Result<(), SdoError> {
            Ok(())
        }
        fn get(&mut self, index: u16, sub_index: u8) -> Result<SdoValue, SdoError> {
            self.gets
                .get(&(index, sub_index))
                .copied()
                .ok_or_else(|| SdoError("no such object".into()))
        }
    }

    fn valid_config() -> Configuration {
        Configuration {
            continuous_current_limit: 10.0,
            peak_current_limit: 15.0,
            peak_current_time: 1.0,
            max_profile_accel: 1_000_000.0,
            max_profile_decel: 1_000_000.0,
            velocity_tracking_error: 10_000.0,
            position_tracking_error: 10_000.0,
            motor_stuck_current_level_pct: 0.0,
            motor_stuck_velocity_threshold: 0.0,
            motor_stuck_timeout: 0.0,
            over_speed_threshold: 100_000.0,
            low_position_limit: 0.0,
            high_position_limit: 0.0,
            brake_engage_msec: 0,
            brake_disengage_msec: 0,
            loop_period_ms: 1,
            torque_slope: 0.0,
            max_motor_speed: 3000.0,
            smooth_factor: 0,
        }
    }

    fn new_epd() -> Epd {
        let mut gets = HashMap::new();
        gets.insert((crate::lc::to_object_index("CA"), 18), SdoValue::F32(4000.0));
        gets.insert((crate::lc::to_object_index("MC"), 1), SdoValue::F32(20.0));
        gets.insert((crate::lc::to_object_index("UM"), 1), SdoValue::I16(1));
        let mut transport = FakeTransport { gets };
        Epd::new(JSD_ELMO_VENDOR_ID, JSD_EPD_PRODUCT_CODE, valid_config(), &mut transport).unwrap()
    }

    #[test]
    fn rejects_wrong_identity() {
        let mut transport = FakeTransport { gets: HashMap::new() };
        let err = Epd::new(0x1, 0x2, valid_config(), &mut transport).unwrap_err();
        assert!(matches!(err, Error::Identity { .. }));
    }

    #[test]
    fn peak_current_scaling_scenario() {
        let mut epd = new_epd();
        epd.set_peak_current(12.5).unwrap();
        assert_eq!(epd.next_rxpdo.max_current, 1250);
    }

    #[test]
    fn digital_output_sets_and_clears_correct_bit() {
        let mut epd = new_epd();
        epd.set_digital_output(2, true).unwrap();
        assert_eq!(epd.next_rxpdo.digital_outputs, 1 << 18);
        epd.set_digital_output(2, false).unwrap();
        assert_eq!(epd.next_rxpdo.digital_outputs, 0);
    }

    #[test]
    fn digital_output_rejects_out_of_range_index() {
        let mut epd = new_epd();
        assert!(epd.set_digital_output(NUM_DIGITAL_OUTPUTS, true).is_err());
    }

    #[test]
    fn cycle_round_trip_drives_rxpdo() {
        let mut epd = new_epd();
        let mut txpdo_bytes = vec![0u8; crate::pdo::TXPDO_LEN];
        let txpdo = TxPdo {
            statusword: 0x0027,
            ..Default::default()
        };
        txpdo.encode(&mut txpdo_bytes).unwrap();

        let clock = FixedClock { monotonic: 0.0, wall: 0.0 };
        epd.read(&txpdo_bytes, &clock).unwrap();
        epd.process(&mut EmptyQueue, &clock).unwrap();

        assert_eq!(
            epd.get_state().actual_state_machine_state,
            Some(StateMachineState::OperationEnabled)
        );
        let bytes = epd.rxpdo_bytes().unwrap();
        assert_eq!(bytes.len(), crate::pdo::RXPDO_LEN);
    }
}
