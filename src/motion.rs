//! Mode-of-operation union and the CSP dispatcher (§4.6).

use crate::pdo::RxPdo;

/// CiA-402 mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ModeOfOperation {
    /// No mode selected; drive holds position.
    Disabled = 0,
    /// Profile position.
    ProfPos = 1,
    /// Profile velocity.
    ProfVel = 3,
    /// Profile torque.
    ProfTorque = 4,
    /// Cyclic synchronous position.
    Csp = 8,
    /// Cyclic synchronous velocity.
    Csv = 9,
    /// Cyclic synchronous torque.
    Cst = 10,
}

/// Cyclic synchronous position command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CspCommand {
    /// Absolute target position, counts.
    pub target_position: i32,
    /// Position feed-forward offset, counts.
    pub position_offset: i32,
    /// Velocity feed-forward offset, counts/s.
    pub velocity_offset: i32,
    /// Torque feed-forward offset, A.
    pub torque_offset_amps: f64,
}

/// Tagged union over the seven CiA-402 motion modes.
///
/// Only [`MotionCommand::Csp`] is populated by the dispatcher today; the
/// other variants exist so an unimplemented mode cannot silently read
/// garbage out of a shared union layout.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MotionCommand {
    /// No motion command staged.
    #[default]
    None,
    /// Profile position (reserved, unimplemented).
    ProfPos,
    /// Profile velocity (reserved, unimplemented).
    ProfVel,
    /// Profile torque (reserved, unimplemented).
    ProfTorque,
    /// Cyclic synchronous position.
    Csp(CspCommand),
    /// Cyclic synchronous velocity (reserved, unimplemented).
    Csv,
    /// Cyclic synchronous torque (reserved, unimplemented).
    Cst,
}

/// Dispatch `command` into `rxpdo` per the active mode.
///
/// Only [`MotionCommand::Csp`] is implemented; other reserved modes log an
/// error and leave `rxpdo` unchanged.
pub fn dispatch(command: &MotionCommand, motor_rated_current_ma: u32, rxpdo: &mut RxPdo) {
    match command {
        MotionCommand::None => {}
        MotionCommand::Csp(cmd) => {
            rxpdo.target_position = cmd.target_position;
            rxpdo.position_offset = cmd.position_offset;
            rxpdo.velocity_offset = cmd.velocity_offset;
            rxpdo.target_velocity = 0;
            rxpdo.target_torque = 0;
            rxpdo.torque_offset =
                (cmd.torque_offset_amps * 1e6 / motor_rated_current_ma as f64) as i16;
            rxpdo.mode_of_operation = ModeOfOperation::Csp as i8;
        }
        MotionCommand::ProfPos | MotionCommand::ProfVel | MotionCommand::ProfTorque => {
            error!("motion mode {:?} is reserved, not implemented", command);
        }
        MotionCommand::Csv | MotionCommand::Cst => {
            error!("motion mode {:?} is reserved, not implemented", command);
        }
    }
}
