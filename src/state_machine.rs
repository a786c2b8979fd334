//! CiA-402 State Machine Core (§4.5).

use crate::clock::Clock;
use crate::emcy::{EmcyKind, EmergencyQueue};
use crate::motion::{dispatch, MotionCommand};
use crate::pdo::{ControlWord, RxPdo, StateMachineState};

/// One-shot edge flags and pending request staged by the command surface,
/// drained by [`run`] each cycle (§3 Private state, §9 Edge-flag commands).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingCommands {
    /// `reset()` was called and has not yet been consumed.
    pub new_reset: bool,
    /// `halt()` was called and has not yet been consumed.
    pub new_halt_command: bool,
    /// A motion command was staged and has not yet been consumed.
    pub new_motion_command: bool,
}

/// Timestamps and latched state private to the State Machine Core (§3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timestamps {
    /// Monotonic time of the last accepted `reset()`.
    pub last_reset_time: Option<f64>,
    /// Wall-clock time of entry into FAULT.
    pub fault_real_time: f64,
    /// Monotonic time of entry into FAULT.
    pub fault_mono_time: f64,
}

/// Rate-limit a `reset()` request against [`crate::RESET_DERATE_SEC`].
///
/// Returns `true` and updates `timestamps.last_reset_time` if the request is
/// accepted; returns `false` (logging a warning) if it arrived too soon
/// after the last accepted reset.
pub fn request_reset(timestamps: &mut Timestamps, clock: &dyn Clock) -> bool {
    let now = clock.monotonic_now();
    if let Some(last) = timestamps.last_reset_time {
        if now - last < crate::RESET_DERATE_SEC {
            warning!("reset() rejected: rate-limited ({:.3}s since last)", now - last);
            return false;
        }
    }
    timestamps.last_reset_time = Some(now);
    true
}

/// Run one cycle of the CiA-402 state tracker.
///
/// `observed_state` is the state masked out of the last TxPDO's statusword.
/// Mutates `commands` (clearing edge flags per §4.5's "end of cycle"
/// clause), `timestamps` (fault entry bookkeeping), `rxpdo` (controlword and
/// mode of operation, and CSP fields via the Mode-of-Operation Dispatcher),
/// and returns the new `emcy_error_code` telemetry should report (`None`
/// means leave the previously reported value unchanged).
#[allow(clippy::too_many_arguments)]
pub fn run(
    observed_state: StateMachineState,
    commands: &mut PendingCommands,
    timestamps: &mut Timestamps,
    motion_command: &MotionCommand,
    motor_rated_current_ma: u32,
    emcy_queue: &mut dyn EmergencyQueue,
    clock: &dyn Clock,
    rxpdo: &mut RxPdo,
) -> Option<u16> {
    let mut emcy_error_code = None;

    match observed_state {
        StateMachineState::NotReadyToSwitchOn => {}
        StateMachineState::SwitchOnDisabled => {
            rxpdo.controlword = ControlWord::SHUTDOWN.bits();
        }
        StateMachineState::ReadyToSwitchOn => {
            rxpdo.controlword = ControlWord::CMD_SWITCH_ON.bits();
        }
        StateMachineState::SwitchedOn => {
            if commands.new_reset {
                rxpdo.controlword = ControlWord::CMD_ENABLE_OPERATION.bits();
                rxpdo.mode_of_operation = crate::motion::ModeOfOperation::ProfPos as i8;
                commands.new_reset = false;
            }
        }
        StateMachineState::OperationEnabled => {
            emcy_error_code = Some(0);
            if commands.new_halt_command {
                commands.new_reset = false;
                rxpdo.controlword = ControlWord::CMD_QUICK_STOP.bits();
                rxpdo.mode_of_operation = crate::motion::ModeOfOperation::ProfPos as i8;
            } else {
                rxpdo.controlword = ControlWord::CMD_ENABLE_OPERATION.bits();
                dispatch(motion_command, motor_rated_current_ma, rxpdo);
            }
        }
        StateMachineState::QuickStopActive => {}
        StateMachineState::FaultReactionActive => {}
        StateMachineState::Fault => {
            emcy_error_code = run_fault_recovery(timestamps, emcy_queue, clock, rxpdo);
        }
    }

    commands.new_motion_command = false;
    commands.new_halt_command = false;

    emcy_error_code
}

fn run_fault_recovery(
    timestamps: &mut Timestamps,
    emcy_queue: &mut dyn EmergencyQueue,
    clock: &dyn Clock,
    rxpdo: &mut RxPdo,
) -> Option<u16> {
    for _ in 0..crate::MAX_ERROR_POPS_PER_CYCLE {
        let Some(entry) = emcy_queue.pop() else {
            break;
        };
        if entry.kind == EmcyKind::Emergency && entry.time > timestamps.fault_real_time {
            rxpdo.controlword = ControlWord::CMD_FAULT_RESET.bits();
            return Some(entry.code);
        }
    }

    if clock.monotonic_now() - timestamps.fault_mono_time > crate::FAULT_EMCY_TIMEOUT_SEC {
        rxpdo.controlword = ControlWord::CMD_FAULT_RESET.bits();
        return Some(0xFFFF);
    }

    None
}

/// Record entry into FAULT, per the Telemetry Decoder's "on transition into
/// FAULT" clause (§4.4). Call once, when `observed_state` first becomes
/// [`StateMachineState::Fault`].
pub fn enter_fault(timestamps: &mut Timestamps, clock: &dyn Clock) {
    timestamps.fault_real_time = clock.wall_now();
    timestamps.fault_mono_time = clock.monotonic_now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emcy::EmcyEntry;
    use pretty_assertions::assert_eq;

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

    struct VecQueue(Vec<EmcyEntry>);

    impl EmergencyQueue for VecQueue {
        fn pop(&mut self) -> Option<EmcyEntry> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    #[test]
    fn switch_on_disabled_emits_shutdown() {
        let mut rxpdo = RxPdo::default();
        let mut commands = PendingCommands::default();
        let mut timestamps = Timestamps::default();
        let mut queue = VecQueue(vec![]);
        let clock = FixedClock { monotonic: 0.0, wall: 0.0 };

        run(
            StateMachineState::SwitchOnDisabled,
            &mut commands,
            &mut timestamps,
            &MotionCommand::None,
            10_000,
            &mut queue,
            &clock,
            &mut rxpdo,
        );

        assert_eq!(rxpdo.controlword, ControlWord::SHUTDOWN.bits());
    }

    #[test]
    fn csp_command_round_trip_scenario() {
        let mut rxpdo = RxPdo::default();
        let mut commands = PendingCommands::default();
        let mut timestamps = Timestamps::default();
        let mut queue = VecQueue(vec![]);
        let clock = FixedClock { monotonic: 0.0, wall: 0.0 };
        let motion = MotionCommand::Csp(crate::motion::CspCommand {
            target_position: 123_456,
            position_offset: 10,
            velocity_offset: 20,
            torque_offset_amps: 1.0,
        });

        run(
            StateMachineState::OperationEnabled,
            &mut commands,
            &mut timestamps,
            &motion,
            10_000,
            &mut queue,
            &clock,
            &mut rxpdo,
        );

        assert_eq!(rxpdo.target_position, 123_456);
        assert_eq!(rxpdo.position_offset, 10);
        assert_eq!(rxpdo.velocity_offset, 20);
        assert_eq!(rxpdo.target_velocity, 0);
        assert_eq!(rxpdo.target_torque, 0);
        assert_eq!(rxpdo.torque_offset, 100);
        assert_eq!(rxpdo.mode_of_operation, 8);
        assert_eq!(rxpdo.controlword, ControlWord::CMD_ENABLE_OPERATION.bits());
    }

    #[test]
    fn halt_priority_scenario() {
        let mut rxpdo = RxPdo::default();
        let mut commands = PendingCommands {
            new_reset: true,
            new_halt_command: true,
            new_motion_command: false,
        };
        let mut timestamps = Timestamps::default();
        let mut queue = VecQueue(vec![]);
        let clock = FixedClock { monotonic: 0.0, wall: 0.0 };

        run(
            StateMachineState::OperationEnabled,
            &mut commands,
            &mut timestamps,
            &MotionCommand::None,
            10_000,
            &mut queue,
            &clock,
            &mut rxpdo,
        );

        assert_eq!(rxpdo.controlword, ControlWord::CMD_QUICK_STOP.bits());
        assert!(!commands.new_reset);
        assert_eq!(rxpdo.mode_of_operation, crate::motion::ModeOfOperation::ProfPos as i8);
    }

    #[test]
    fn fault_with_emcy_scenario() {
        let mut rxpdo = RxPdo::default();
        let mut commands = PendingCommands::default();
        let mut timestamps = Timestamps {
            fault_real_time: 100.0,
            fault_mono_time: 0.0,
            ..Default::default()
        };
        let mut queue = VecQueue(vec![EmcyEntry {
            time: 100.5,
            kind: EmcyKind::Emergency,
            code: 0x7380,
        }]);
        let clock = FixedClock { monotonic: 0.1, wall: 0.0 };

        let code = run(
            StateMachineState::Fault,
            &mut commands,
            &mut timestamps,
            &MotionCommand::None,
            10_000,
            &mut queue,
            &clock,
            &mut rxpdo,
        );

        assert_eq!(code, Some(0x7380));
        assert_eq!(rxpdo.controlword, ControlWord::CMD_FAULT_RESET.bits());
    }

    #[test]
    fn fault_without_emcy_scenario() {
        let mut rxpdo = RxPdo::default();
        let mut commands = PendingCommands::default();
        let mut timestamps = Timestamps {
            fault_real_time: 0.0,
            fault_mono_time: 50.0,
            ..Default::default()
        };
        let mut queue = VecQueue(vec![]);

        let clock_before = FixedClock { monotonic: 50.5, wall: 0.0 };
        let code_before = run(
            StateMachineState::Fault,
            &mut commands,
            &mut timestamps,
            &MotionCommand::None,
            10_000,
            &mut queue,
            &clock_before,
            &mut rxpdo,
        );
        assert_eq!(code_before, None);

        let clock_after = FixedClock { monotonic: 51.1, wall: 0.0 };
        let code_after = run(
            StateMachineState::Fault,
            &mut commands,
            &mut timestamps,
            &MotionCommand::None,
            10_000,
            &mut queue,
            &clock_after,
            &mut rxpdo,
        );
        assert_eq!(code_after, Some(0xFFFF));
        assert_eq!(rxpdo.controlword, ControlWord::CMD_FAULT_RESET.bits());
    }

    #[test]
    fn reset_derate_scenario() {
        let mut timestamps = Timestamps::default();

        assert!(request_reset(&mut timestamps, &FixedClock { monotonic: 0.0, wall: 0.0 }));
        assert!(!request_reset(&mut timestamps, &FixedClock { monotonic: 0.5, wall: 0.0 }));
        assert!(request_reset(&mut timestamps, &FixedClock { monotonic: 1.6, wall: 0.0 }));
    }

    #[test]
    fn halt_called_twice_is_idempotent_within_a_cycle() {
        let mut rxpdo = RxPdo::default();
        let mut commands = PendingCommands {
            new_halt_command: true,
            ..Default::default()
        };
        commands.new_halt_command = true;
        let mut timestamps = Timestamps::default();
        let mut queue = VecQueue(vec![]);
        let clock = FixedClock { monotonic: 0.0, wall: 0.0 };

        run(
            StateMachineState::OperationEnabled,
            &mut commands,
            &mut timestamps,
            &MotionCommand::None,
            10_000,
            &mut queue,
            &clock,
            &mut rxpdo,
        );

        assert!(!commands.new_halt_command);
        assert!(!commands.new_motion_command);
    }
}
