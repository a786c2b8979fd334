//! Startup Configurator (§4.3): one-shot pre-op → safe-op SDO configuration.

use crate::config::Configuration;
use crate::error::Error;
use crate::lc;
use crate::sdo::{SdoTransport, SdoValue};

const OBJ_MODE_OF_OPERATION: u16 = 0x6060;
const OBJ_POSITION_OPTION_CODE: u16 = 0x60F2;
const OBJ_INTERPOLATION_PERIOD: u16 = 0x60C2;
const OBJ_EXTRAPOLATION_TIMEOUT: u16 = 0x3675;
const OBJ_QUICK_STOP_OPTION: u16 = 0x605A;
const OBJ_MOTOR_RATED_CURRENT: u16 = 0x6075;
const OBJ_TORQUE_SLOPE: u16 = 0x6087;
const OBJ_MAX_MOTOR_SPEED: u16 = 0x6080;
const OBJ_RXPDO_MAPPING_1: u16 = 0x1602;
const OBJ_RXPDO_MAPPING_2: u16 = 0x1603;
const OBJ_RXPDO_ASSIGN: u16 = 0x1C12;
const OBJ_TXPDO_MAPPING_1: u16 = 0x1A02;
const OBJ_TXPDO_MAPPING_2: u16 = 0x1A03;
const OBJ_TXPDO_ASSIGN: u16 = 0x1C13;

const PROF_POS: i8 = 1;

fn sdo_set(
    transport: &mut dyn SdoTransport,
    index: u16,
    sub_index: u8,
    value: SdoValue,
) -> Result<(), Error> {
    transport
        .set(index, sub_index, value)
        .map_err(|source| Error::Sdo { index, sub_index, source })
}

fn sdo_set_complete_access(
    transport: &mut dyn SdoTransport,
    index: u16,
    bytes: &[u8],
) -> Result<(), Error> {
    transport
        .set_complete_access(index, bytes)
        .map_err(|source| Error::Sdo { index, sub_index: 0, source })
}

fn sdo_get(transport: &mut dyn SdoTransport, index: u16, sub_index: u8) -> Result<SdoValue, Error> {
    transport
        .get(index, sub_index)
        .map_err(|source| Error::Sdo { index, sub_index, source })
}

fn expect_f32(value: SdoValue, index: u16, sub_index: u8) -> Result<f32, Error> {
    match value {
        SdoValue::F32(v) => Ok(v),
        _ => Err(Error::Sdo {
            index,
            sub_index,
            source: crate::sdo::SdoError("unexpected SDO reply type, expected f32".into()),
        }),
    }
}

fn expect_i16(value: SdoValue, index: u16, sub_index: u8) -> Result<i16, Error> {
    match value {
        SdoValue::I16(v) => Ok(v),
        _ => Err(Error::Sdo {
            index,
            sub_index,
            source: crate::sdo::SdoError("unexpected SDO reply type, expected i16".into()),
        }),
    }
}

/// Run the one-shot startup configuration sequence, in the order §4.3
/// specifies. Aborts on the first SDO failure; on success returns the
/// `motor_rated_current` (mA) the cyclic core should use for scaling.
pub fn configure(config: &Configuration, transport: &mut dyn SdoTransport) -> Result<u32, Error> {
    config.validate()?;

    // Disabling CoE Complete Access and enabling the LRW block flag on the
    // slave descriptor is a bus-master concern, not an SDO access; it is
    // assumed done by the caller before `configure` runs.
    msg!("writing RxPDO mapping 0x1602/0x1603");
    sdo_set_complete_access(transport, OBJ_RXPDO_MAPPING_1, &rxpdo_mapping_1())?;
    sdo_set_complete_access(transport, OBJ_RXPDO_MAPPING_2, &rxpdo_mapping_2())?;
    sdo_set_complete_access(transport, OBJ_RXPDO_ASSIGN, &pdo_assign(&[OBJ_RXPDO_MAPPING_1, OBJ_RXPDO_MAPPING_2]))?;

    msg!("writing TxPDO mapping 0x1A02/0x1A03");
    sdo_set_complete_access(transport, OBJ_TXPDO_MAPPING_1, &txpdo_mapping_1())?;
    sdo_set_complete_access(transport, OBJ_TXPDO_MAPPING_2, &txpdo_mapping_2())?;
    sdo_set_complete_access(transport, OBJ_TXPDO_ASSIGN, &pdo_assign(&[OBJ_TXPDO_MAPPING_1, OBJ_TXPDO_MAPPING_2]))?;

    msg!("writing CiA-402 configuration objects");
    sdo_set(transport, OBJ_MODE_OF_OPERATION, 0, SdoValue::I8(PROF_POS))?;
    sdo_set(transport, OBJ_POSITION_OPTION_CODE, 0, SdoValue::U16(0x02))?;
    sdo_set(
        transport,
        OBJ_INTERPOLATION_PERIOD,
        1,
        SdoValue::U8(config.loop_period_ms),
    )?;
    // TODO(dloret): confirm against vendor documentation whether 0x3675 replaces 0x2F75.
    sdo_set(transport, OBJ_EXTRAPOLATION_TIMEOUT, 0, SdoValue::I16(5))?;
    sdo_set(transport, OBJ_QUICK_STOP_OPTION, 0, SdoValue::I16(2))?;

    let motor_rated_current_ma = config.motor_rated_current_ma();
    sdo_set(
        transport,
        OBJ_MOTOR_RATED_CURRENT,
        0,
        SdoValue::U32(motor_rated_current_ma),
    )?;
    sdo_set(
        transport,
        OBJ_TORQUE_SLOPE,
        0,
        SdoValue::U32((config.torque_slope * 1e6 / motor_rated_current_ma as f64) as u32),
    )?;

    let counts_per_rev = expect_f32(sdo_get(transport, lc::to_object_index("CA"), 18)?, lc::to_object_index("CA"), 18)?;
    sdo_set(
        transport,
        OBJ_MAX_MOTOR_SPEED,
        0,
        SdoValue::U32((config.max_motor_speed / counts_per_rev as f64 * 60.0).round() as u32),
    )?;

    msg!("writing Elmo LC parameters");
    write_lc_parameters(config, transport)?;

    let drive_max_current = expect_f32(sdo_get(transport, lc::to_object_index("MC"), 1)?, lc::to_object_index("MC"), 1)?;
    if config.peak_current_limit > drive_max_current {
        return Err(Error::Config("peak_current_limit exceeds drive-reported MC[1]"));
    }
    if config.continuous_current_limit > config.peak_current_limit {
        return Err(Error::Config("continuous_current_limit exceeds peak_current_limit"));
    }

    let unit_mode = expect_i16(sdo_get(transport, lc::to_object_index("UM"), 1)?, lc::to_object_index("UM"), 1)?;
    debug!("drive reports UM[1] = {}", unit_mode);

    success!("startup configuration complete");
    Ok(motor_rated_current_ma)
}

fn write_lc_parameters(config: &Configuration, transport: &mut dyn SdoTransport) -> Result<(), Error> {
    sdo_set(transport, lc::to_object_index("AC"), 1, SdoValue::F64(config.max_profile_accel))?;
    sdo_set(transport, lc::to_object_index("DC"), 1, SdoValue::F64(config.max_profile_decel))?;
    sdo_set(transport, lc::to_object_index("ER"), 2, SdoValue::F64(config.velocity_tracking_error))?;
    sdo_set(transport, lc::to_object_index("ER"), 3, SdoValue::F64(config.position_tracking_error))?;
    sdo_set(transport, lc::to_object_index("PL"), 2, SdoValue::F32(config.peak_current_time))?;
    sdo_set(transport, lc::to_object_index("PL"), 1, SdoValue::F32(config.peak_current_limit))?;
    sdo_set(transport, lc::to_object_index("CL"), 1, SdoValue::F32(config.continuous_current_limit))?;
    sdo_set(transport, lc::to_object_index("CL"), 2, SdoValue::F32(config.motor_stuck_current_level_pct))?;
    sdo_set(transport, lc::to_object_index("CL"), 3, SdoValue::F32(config.motor_stuck_velocity_threshold))?;
    sdo_set(transport, lc::to_object_index("CL"), 4, SdoValue::F32(config.motor_stuck_timeout))?;
    sdo_set(transport, lc::to_object_index("HL"), 2, SdoValue::F64(config.over_speed_threshold))?;
    sdo_set(transport, lc::to_object_index("LL"), 3, SdoValue::F64(config.low_position_limit))?;
    sdo_set(transport, lc::to_object_index("HL"), 3, SdoValue::F64(config.high_position_limit))?;
    sdo_set(transport, lc::to_object_index("BP"), 1, SdoValue::I16(config.brake_engage_msec))?;
    sdo_set(transport, lc::to_object_index("BP"), 2, SdoValue::I16(config.brake_disengage_msec))?;
    sdo_set(transport, lc::to_object_index("SF"), 1, SdoValue::I64(config.smooth_factor))?;
    Ok(())
}

fn pdo_entry(index: u16, sub_index: u8, bit_len: u8) -> u32 {
    (index as u32) << 16 | (sub_index as u32) << 8 | bit_len as u32
}

fn rxpdo_mapping_1() -> [u8; 8 * 4] {
    let entries = [
        pdo_entry(0x607A, 0, 32), // target_position
        pdo_entry(0x60FF, 0, 32), // target_velocity
        pdo_entry(0x6071, 0, 16), // target_torque
        pdo_entry(0x60B0, 0, 32), // position_offset
        pdo_entry(0x60B1, 0, 32), // velocity_offset
        pdo_entry(0x60B2, 0, 16), // torque_offset
        pdo_entry(0x6060, 0, 8),  // mode_of_operation
        pdo_entry(0x6073, 0, 16), // max_current
    ];
    let mut buf = [0u8; 8 * 4];
    for (i, entry) in entries.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    buf
}

fn rxpdo_mapping_2() -> [u8; 2 * 4] {
    let entries = [
        pdo_entry(0x60FE, 1, 32), // digital_outputs
        pdo_entry(0x6040, 0, 16), // controlword
    ];
    let mut buf = [0u8; 2 * 4];
    for (i, entry) in entries.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    buf
}

fn txpdo_mapping_1() -> [u8; 8 * 4] {
    let entries = [
        pdo_entry(0x6064, 0, 32), // actual_position
        pdo_entry(0x6069, 0, 32), // velocity_actual_value
        pdo_entry(0x6078, 0, 16), // current_actual_value
        pdo_entry(0x6061, 0, 8),  // mode_of_operation_display
        pdo_entry(0x6079, 0, 32), // dc_link_circuit_voltage
        pdo_entry(0x3610, 0, 32), // drive_temperature_deg_c
        pdo_entry(0x60FD, 0, 32), // digital_inputs
        pdo_entry(0x2205, 1, 16), // analog_input_1
    ];
    let mut buf = [0u8; 8 * 4];
    for (i, entry) in entries.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    buf
}

fn txpdo_mapping_2() -> [u8; 4 * 4] {
    let entries = [
        pdo_entry(0x2205, 2, 16), // analog_input_2
        pdo_entry(0x3607, 1, 32), // status_register_1
        pdo_entry(0x3607, 2, 32), // status_register_2
        pdo_entry(0x6041, 0, 16), // statusword
    ];
    let mut buf = [0u8; 4 * 4];
    for (i, entry) in entries.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    buf
}

fn pdo_assign(indices: &[u16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(indices.len() * 2);
    for index in indices {
        buf.extend_from_slice(&index.to_le_bytes());
    }
    buf
}
