//! Fixed packed little-endian layouts for the RxPDO/TxPDO frames, plus the
//! CiA-402 controlword/statusword bit patterns. Field order and widths are
//! contractual: they must match the 0x1602/0x1603/0x1A02/0x1A03 mapping
//! objects written by [`crate::startup`].

use crate::error::Error;

/// Host → drive process data, written into the slave's outputs each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RxPdo {
    /// Target position, counts.
    pub target_position: i32,
    /// Target velocity, counts/s.
    pub target_velocity: i32,
    /// Target torque, mille-rated-current units.
    pub target_torque: i16,
    /// Position feed-forward offset, counts.
    pub position_offset: i32,
    /// Velocity feed-forward offset, counts/s.
    pub velocity_offset: i32,
    /// Torque feed-forward offset, mille-rated-current units.
    pub torque_offset: i16,
    /// CiA-402 mode of operation to command.
    pub mode_of_operation: i8,
    /// Maximum current ceiling, mille-rated-current units.
    pub max_current: u16,
    /// Digital output bits.
    pub digital_outputs: u32,
    /// CiA-402 controlword.
    pub controlword: u16,
}

/// Packed size of [`RxPdo`] on the wire, in bytes.
pub const RXPDO_LEN: usize = 4 + 4 + 2 + 4 + 4 + 2 + 1 + 2 + 4 + 2;

impl RxPdo {
    /// Encode into `buf`, which must be exactly [`RXPDO_LEN`] bytes.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() != RXPDO_LEN {
            return Err(Error::PdoLength {
                expected: RXPDO_LEN,
                got: buf.len(),
            });
        }

        let mut w = Writer::new(buf);
        w.i32(self.target_position);
        w.i32(self.target_velocity);
        w.i16(self.target_torque);
        w.i32(self.position_offset);
        w.i32(self.velocity_offset);
        w.i16(self.torque_offset);
        w.i8(self.mode_of_operation);
        w.u16(self.max_current);
        w.u32(self.digital_outputs);
        w.u16(self.controlword);
        Ok(())
    }

    /// Decode from `buf`, which must be exactly [`RXPDO_LEN`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != RXPDO_LEN {
            return Err(Error::PdoLength {
                expected: RXPDO_LEN,
                got: buf.len(),
            });
        }

        let mut r = Reader::new(buf);
        Ok(Self {
            target_position: r.i32(),
            target_velocity: r.i32(),
            target_torque: r.i16(),
            position_offset: r.i32(),
            velocity_offset: r.i32(),
            torque_offset: r.i16(),
            mode_of_operation: r.i8(),
            max_current: r.u16(),
            digital_outputs: r.u32(),
            controlword: r.u16(),
        })
    }
}

/// Drive → host process data, read from the slave's inputs each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TxPdo {
    /// Actual position, counts.
    pub actual_position: i32,
    /// Actual velocity, counts/s.
    pub velocity_actual_value: i32,
    /// Actual current, mille-rated-current units.
    pub current_actual_value: i16,
    /// CiA-402 mode of operation the drive reports being in.
    pub mode_of_operation_display: i8,
    /// DC bus link voltage, mV.
    pub dc_link_circuit_voltage: u32,
    /// Drive temperature, degrees Celsius.
    pub drive_temperature_deg_c: i32,
    /// Digital input bits.
    pub digital_inputs: u32,
    /// Analog input 1, mV.
    pub analog_input_1: u16,
    /// Analog input 2, raw ADC counts.
    pub analog_input_2: u16,
    /// Manufacturer status register 1.
    pub status_register_1: u32,
    /// Manufacturer status register 2.
    pub status_register_2: u32,
    /// CiA-402 statusword.
    pub statusword: u16,
}

/// Packed size of [`TxPdo`] on the wire, in bytes.
pub const TXPDO_LEN: usize = 4 + 4 + 2 + 1 + 4 + 4 + 4 + 2 + 2 + 4 + 4 + 2;

impl TxPdo {
    /// Decode from `buf`, which must be exactly [`TXPDO_LEN`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != TXPDO_LEN {
            return Err(Error::PdoLength {
                expected: TXPDO_LEN,
                got: buf.len(),
            });
        }

        let mut r = Reader::new(buf);
        Ok(Self {
            actual_position: r.i32(),
            velocity_actual_value: r.i32(),
            current_actual_value: r.i16(),
            mode_of_operation_display: r.i8(),
            dc_link_circuit_voltage: r.u32(),
            drive_temperature_deg_c: r.i32(),
            digital_inputs: r.u32(),
            analog_input_1: r.u16(),
            analog_input_2: r.u16(),
            status_register_1: r.u32(),
            status_register_2: r.u32(),
            statusword: r.u16(),
        })
    }

    /// Encode into `buf`, which must be exactly [`TXPDO_LEN`] bytes.
    ///
    /// Only used by tests to exercise the round-trip invariant; the real
    /// drive is the only TxPDO producer in cyclic operation.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() != TXPDO_LEN {
            return Err(Error::PdoLength {
                expected: TXPDO_LEN,
                got: buf.len(),
            });
        }

        let mut w = Writer::new(buf);
        w.i32(self.actual_position);
        w.i32(self.velocity_actual_value);
        w.i16(self.current_actual_value);
        w.i8(self.mode_of_operation_display);
        w.u32(self.dc_link_circuit_voltage);
        w.i32(self.drive_temperature_deg_c);
        w.u32(self.digital_inputs);
        w.u16(self.analog_input_1);
        w.u16(self.analog_input_2);
        w.u32(self.status_register_1);
        w.u32(self.status_register_2);
        w.u16(self.statusword);
        Ok(())
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn i8(&mut self, v: i8) {
        self.put(&v.to_le_bytes());
    }
    fn i16(&mut self, v: i16) {
        self.put(&v.to_le_bytes());
    }
    fn u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.put(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn i8(&mut self) -> i8 {
        i8::from_le_bytes(self.take())
    }
    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }
    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }
    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }
    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }
}

bitflags::bitflags! {
    /// CiA-402 controlword bit patterns. Combinations below are the
    /// contractual commands the state machine emits; individual bits are
    /// not otherwise inspected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlWord: u16 {
        /// Switch on.
        const SWITCH_ON = 1 << 0;
        /// Disable voltage (inverted: clear to disable).
        const DISABLE_VOLTAGE = 1 << 1;
        /// Quick stop (inverted: clear to quick-stop).
        const QUICK_STOP = 1 << 2;
        /// Enable operation.
        const ENABLE_OPERATION = 1 << 3;
        /// Reset fault, rising-edge triggered.
        const FAULT_RESET = 1 << 7;

        /// SWITCH_ON_DISABLED → READY_TO_SWITCH_ON.
        const SHUTDOWN = Self::QUICK_STOP.bits() | Self::DISABLE_VOLTAGE.bits();
        /// READY_TO_SWITCH_ON → SWITCHED_ON.
        const CMD_SWITCH_ON = Self::QUICK_STOP.bits() | Self::DISABLE_VOLTAGE.bits() | Self::SWITCH_ON.bits();
        /// SWITCHED_ON → OPERATION_ENABLED.
        const CMD_ENABLE_OPERATION = Self::ENABLE_OPERATION.bits() | Self::QUICK_STOP.bits() | Self::DISABLE_VOLTAGE.bits() | Self::SWITCH_ON.bits();
        /// OPERATION_ENABLED → QUICK_STOP_ACTIVE.
        const CMD_QUICK_STOP = Self::DISABLE_VOLTAGE.bits();
        /// FAULT → (self-clearing) SWITCH_ON_DISABLED.
        const CMD_FAULT_RESET = Self::FAULT_RESET.bits();
    }
}

/// Bitmask isolating the CiA-402 state bits of a statusword.
pub const STATE_MACHINE_STATE_MASK: u16 = 0x006F;

/// CiA-402 drive state machine states, as masked out of the statusword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StateMachineState {
    /// Internal initial state; never host-observable in practice.
    NotReadyToSwitchOn = 0x00,
    /// Drive is deactivated and disabled.
    SwitchOnDisabled = 0x40,
    /// Drive is ready to be switched on.
    ReadyToSwitchOn = 0x21,
    /// Drive is switched on, not yet enabled.
    SwitchedOn = 0x23,
    /// Drive is fully enabled and following commands.
    OperationEnabled = 0x27,
    /// Quick stop is in progress.
    QuickStopActive = 0x07,
    /// Drive is reacting to a detected fault.
    FaultReactionActive = 0x0F,
    /// Drive has latched a fault.
    Fault = 0x08,
}

impl StateMachineState {
    /// Mask a raw statusword down to its CiA-402 state and classify it.
    pub fn from_statusword(statusword: u16) -> Option<Self> {
        match statusword & STATE_MACHINE_STATE_MASK {
            0x00 => Some(Self::NotReadyToSwitchOn),
            0x40 => Some(Self::SwitchOnDisabled),
            0x21 => Some(Self::ReadyToSwitchOn),
            0x23 => Some(Self::SwitchedOn),
            0x27 => Some(Self::OperationEnabled),
            0x07 => Some(Self::QuickStopActive),
            0x0F => Some(Self::FaultReactionActive),
            0x08 => Some(Self::Fault),
            _ => None,
        }
    }
}

/// Named bit accessors for the statusword, rather than open-coded shifts.
pub struct StatusWordBits(pub u16);

impl StatusWordBits {
    /// Bit 7: an internal warning is active.
    pub fn warning(&self) -> bool {
        self.0 >> 7 & 0x01 != 0
    }

    /// Bit 10: the commanded target has been reached.
    pub fn target_reached(&self) -> bool {
        self.0 >> 10 & 0x01 != 0
    }
}

/// Named bit accessors for manufacturer status register 1.
pub struct StatusRegister1(pub u32);

impl StatusRegister1 {
    /// Bit 4: servo loop is enabled.
    pub fn servo_enabled(&self) -> bool {
        self.0 >> 4 & 0x01 != 0
    }

    /// Bit 6: a fault occurred while the drive was enabled.
    pub fn fault_occurred_when_enabled(&self) -> bool {
        self.0 >> 6 & 0x01 != 0
    }

    /// Bit 22: the motor output stage is on.
    pub fn motor_on(&self) -> bool {
        self.0 >> 22 & 0x01 != 0
    }

    /// Bit 23: the motor is in motion.
    pub fn in_motion(&self) -> bool {
        self.0 >> 23 & 0x01 != 0
    }

    /// Bits 25 & 26: Safe Torque Off is engaged (NOT (bit25 AND bit26)).
    pub fn sto_engaged(&self) -> bool {
        let ok_a = self.0 >> 25 & 0x01 != 0;
        let ok_b = self.0 >> 26 & 0x01 != 0;
        !(ok_a && ok_b)
    }
}

/// Named bit accessors for manufacturer status register 2.
pub struct StatusRegister2(pub u32);

impl StatusRegister2 {
    /// Bits 0..2: hall sensor state.
    pub fn hall_state(&self) -> u8 {
        (self.0 & 0x07) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rxpdo_round_trip() {
        let frame = RxPdo {
            target_position: 123_456,
            target_velocity: -10,
            target_torque: 50,
            position_offset: 10,
            velocity_offset: 20,
            torque_offset: 100,
            mode_of_operation: 8,
            max_current: 1250,
            digital_outputs: 0x0001_0000,
            controlword: ControlWord::CMD_ENABLE_OPERATION.bits(),
        };

        let mut buf = [0u8; RXPDO_LEN];
        frame.encode(&mut buf).unwrap();
        assert_eq!(RxPdo::decode(&buf).unwrap(), frame);
    }

    #[test]
    fn txpdo_round_trip() {
        let frame = TxPdo {
            actual_position: -42,
            velocity_actual_value: 7,
            current_actual_value: 300,
            mode_of_operation_display: 8,
            dc_link_circuit_voltage: 48_000,
            drive_temperature_deg_c: 35,
            digital_inputs: 0x0003_0008,
            analog_input_1: 1000,
            analog_input_2: 2048,
            status_register_1: 0x0260_0050,
            status_register_2: 0x0000_0005,
            statusword: 0x0237,
        };

        let mut buf = [0u8; TXPDO_LEN];
        frame.encode(&mut buf).unwrap();
        assert_eq!(TxPdo::decode(&buf).unwrap(), frame);
    }

    #[test]
    fn rejects_wrong_length_buffers() {
        let buf = [0u8; 4];
        assert!(matches!(
            RxPdo::decode(&buf),
            Err(Error::PdoLength { expected, got }) if expected == RXPDO_LEN && got == 4
        ));
    }

    #[test]
    fn state_machine_state_masking() {
        assert_eq!(
            StateMachineState::from_statusword(0x0237),
            Some(StateMachineState::OperationEnabled)
        );
        assert_eq!(
            StateMachineState::from_statusword(0xFF08),
            Some(StateMachineState::Fault)
        );
        assert_eq!(StateMachineState::from_statusword(0x0001), None);
    }

    #[test]
    fn status_register_1_sto_requires_both_ok_bits() {
        let both_ok = StatusRegister1((1 << 25) | (1 << 26));
        assert!(!both_ok.sto_engaged());

        let one_missing = StatusRegister1(1 << 25);
        assert!(one_missing.sto_engaged());
    }
}
