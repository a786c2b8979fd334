//! Public per-cycle telemetry snapshot and the Telemetry Decoder (§4.4).

use crate::pdo::{RxPdo, StatusRegister1, StatusRegister2, StatusWordBits, StateMachineState, TxPdo};

/// Public, read-only snapshot of drive state, refreshed each `read()`.
///
/// Stable until the next `read()` call; §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct State {
    /// Actual position, counts.
    pub actual_position: i32,
    /// Actual velocity, counts/s.
    pub actual_velocity: i32,
    /// Actual current, A.
    pub actual_current: f64,
    /// Commanded position, counts.
    pub cmd_position: i32,
    /// Commanded velocity, counts/s.
    pub cmd_velocity: i32,
    /// Commanded current, A.
    pub cmd_current: f64,
    /// Commanded feed-forward position, counts.
    pub cmd_ff_position: i32,
    /// Commanded feed-forward velocity, counts/s.
    pub cmd_ff_velocity: i32,
    /// Commanded feed-forward current, A.
    pub cmd_ff_current: f64,
    /// Commanded max current ceiling, A.
    pub cmd_max_current: f64,
    /// Actual CiA-402 mode of operation reported by the drive.
    pub actual_mode_of_operation: i8,
    /// Masked CiA-402 state machine state.
    pub actual_state_machine_state: Option<StateMachineState>,
    /// Statusword bit 7.
    pub warning: bool,
    /// Statusword bit 10.
    pub target_reached: bool,
    /// status_register_1 bit 4.
    pub servo_enabled: bool,
    /// status_register_1 bits 25 & 26, inverted-and.
    pub sto_engaged: bool,
    /// status_register_1 bit 22.
    pub motor_on: bool,
    /// status_register_1 bit 23.
    pub in_motion: bool,
    /// status_register_2 bits 0..2.
    pub hall_state: u8,
    /// Public digital inputs, bits 16..16+N of digital_inputs.
    pub digital_inputs: [bool; crate::NUM_DIGITAL_INPUTS],
    /// DC bus link voltage, V.
    pub bus_voltage: f64,
    /// Analog input 1, V.
    pub analog_input_voltage: f64,
    /// Analog input 2, raw ADC counts.
    pub analog_input_adc: u16,
    /// Drive temperature, degrees Celsius.
    pub drive_temperature_deg_c: i32,
    /// Last captured emergency error code; 0 when clear.
    pub emcy_error_code: u16,
}

/// Project `txpdo`/`last_rxpdo` into a [`State`], applying the scalings and
/// bit-field extractions of §4.4.
///
/// Does not itself decide fault entry or EMCY capture; the caller (the state
/// machine, which owns `emcy_error_code` across cycles) is responsible for
/// carrying that field forward and updating it on FAULT transitions.
pub fn decode(txpdo: &TxPdo, last_rxpdo: &RxPdo, motor_rated_current_ma: u32, emcy_error_code: u16) -> State {
    let rated = motor_rated_current_ma as f64;
    let status = StatusWordBits(txpdo.statusword);
    let sr1 = StatusRegister1(txpdo.status_register_1);
    let sr2 = StatusRegister2(txpdo.status_register_2);

    let mut digital_inputs = [false; crate::NUM_DIGITAL_INPUTS];
    for (i, slot) in digital_inputs.iter_mut().enumerate() {
        *slot = txpdo.digital_inputs >> (16 + i) & 0x01 != 0;
    }

    State {
        actual_position: txpdo.actual_position,
        actual_velocity: txpdo.velocity_actual_value,
        actual_current: txpdo.current_actual_value as f64 * rated / 1e6,
        cmd_position: last_rxpdo.target_position,
        cmd_velocity: last_rxpdo.target_velocity,
        cmd_current: last_rxpdo.target_torque as f64 * rated / 1e6,
        cmd_ff_position: last_rxpdo.position_offset,
        cmd_ff_velocity: last_rxpdo.velocity_offset,
        cmd_ff_current: last_rxpdo.torque_offset as f64 * rated / 1e6,
        cmd_max_current: last_rxpdo.max_current as f64 * rated / 1e6,
        actual_mode_of_operation: txpdo.mode_of_operation_display,
        actual_state_machine_state: StateMachineState::from_statusword(txpdo.statusword),
        warning: status.warning(),
        target_reached: status.target_reached(),
        servo_enabled: sr1.servo_enabled(),
        sto_engaged: sr1.sto_engaged(),
        motor_on: sr1.motor_on(),
        in_motion: sr1.in_motion(),
        hall_state: sr2.hall_state(),
        digital_inputs,
        bus_voltage: txpdo.dc_link_circuit_voltage as f64 / 1000.0,
        analog_input_voltage: txpdo.analog_input_1 as f64 / 1000.0,
        analog_input_adc: txpdo.analog_input_2,
        drive_temperature_deg_c: txpdo.drive_temperature_deg_c,
        emcy_error_code,
    }
}
