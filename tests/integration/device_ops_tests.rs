//! Facade operations: servo commands, EEPROM, worm modules, IMU, flash.

use armh7link::device::command::{CMD_MULTI_SERVO_SINGLE_VELOCITY, CMD_SERVO_PARAM, PARAM_STRETCH};
use armh7link::device::eeprom::EepromParam;
use armh7link::device::worm::WormCalibration;
use armh7link::error::Error;
use armh7link::schema::{RecordKind, Value, imu, servo, worm};

use super::mock_device::{
    DATA_ADDRESS_BASE, EDATA, IMU_BASE, SDATA, SERVO_BASE, SIDATA, Seen, SimBoard, UW_TICK_PRIO,
    WORM_BASE, device, symbols,
};

fn commands(board: &SimBoard) -> Vec<(u8, Vec<u8>)> {
    board
        .requests()
        .into_iter()
        .filter_map(|r| match r {
            Seen::Command { command, body } => Some((command, body)),
            _ => None,
        })
        .collect()
}

// ── Servo commands ────────────────────────────────────────────

#[test]
fn angle_vector_command_layout() {
    let board = SimBoard::new();
    let dev = device(&board);
    dev.servo_angle_vector(&[9, 2], &[8000.0, 7000.0], 40.0).unwrap();

    let sent = commands(&board);
    assert_eq!(sent.len(), 1);
    let (command, body) = &sent[0];
    assert_eq!(*command, CMD_MULTI_SERVO_SINGLE_VELOCITY);
    assert_eq!(&body[..5], &[0b0000_0100, 0b0000_0010, 0, 0, 0]);
    assert_eq!(body[5], 40);
    assert_eq!(&body[6..], &[0x58, 0x1B, 0x40, 0x1F]);
}

#[test]
fn hold_defaults_to_discovered_servos() {
    let board = SimBoard::new();
    for index in [1usize, 3] {
        board.poke_field(RecordKind::Servo, SERVO_BASE, index, &servo::FLAG, &[1]);
    }
    let dev = device(&board);
    dev.hold(None).unwrap();

    let (_, body) = commands(&board).pop().unwrap();
    assert_eq!(body[0], 0b0000_1010);
    assert_eq!(body[5], 255);
    assert_eq!(&body[6..], &[0xFF, 0x7F, 0xFF, 0x7F]);
}

#[test]
fn free_and_neutral_use_sentinel_positions() {
    let board = SimBoard::new();
    let dev = device(&board);
    dev.free(Some(&[0])).unwrap();
    dev.neutral(Some(&[0]), 20.0).unwrap();

    let sent = commands(&board);
    assert_eq!(&sent[0].1[6..], &32768u16.to_le_bytes());
    assert_eq!(sent[1].1[5], 20);
    assert_eq!(&sent[1].1[6..], &7500u16.to_le_bytes());
}

#[test]
fn servo_id_40_is_rejected_before_sending() {
    let board = SimBoard::new();
    let dev = device(&board);
    assert!(matches!(
        dev.servo_angle_vector(&[40], &[7500.0], 1.0),
        Err(Error::InvalidIndex { index: 40, .. })
    ));
    assert!(board.requests().is_empty());
}

// ── EEPROM / stretch ──────────────────────────────────────────

fn poke_params(board: &SimBoard, index: usize, image: &[u8; 64]) {
    board.poke_field(RecordKind::Servo, SERVO_BASE, index, &servo::PARAMS, image);
}

#[test]
fn eeprom_params_decode_from_servo_record() {
    let board = SimBoard::new();
    let mut image = [0u8; 64];
    image[2] = 0x0F; // stretch gain high nibble
    image[3] = 0x0E;
    image[16..20].copy_from_slice(&[0x02, 0x02, 0x0B, 0x0C]);
    image[56..58].copy_from_slice(&[0x00, 0x05]);
    poke_params(&board, 2, &image);

    let dev = device(&board);
    let params = dev
        .servo_params(2, &[EepromParam::StretchGain, EepromParam::PulseMaxLimit, EepromParam::ServoId])
        .unwrap();
    assert_eq!(
        params,
        vec![
            (EepromParam::StretchGain, 0xFE),
            (EepromParam::PulseMaxLimit, 0x22BC),
            (EepromParam::ServoId, 5),
        ]
    );
    assert_eq!(dev.servo_params(2, &[]).unwrap().len(), EepromParam::ALL.len());
}

#[test]
fn stretch_is_half_the_gain() {
    let board = SimBoard::new();
    let mut image = [0u8; 64];
    image[2] = 0x0F;
    image[3] = 0x0E;
    poke_params(&board, 2, &image);
    image[2] = 0x03;
    image[3] = 0x0C;
    poke_params(&board, 6, &image);

    let dev = device(&board);
    assert_eq!(dev.read_stretch(Some(&[2, 6])).unwrap(), vec![127, 30]);
}

#[test]
fn send_stretch_is_a_param_command() {
    let board = SimBoard::new();
    let dev = device(&board);
    dev.send_stretch(60.0, Some(&[8, 1])).unwrap();

    let (command, body) = commands(&board).pop().unwrap();
    assert_eq!(command, CMD_SERVO_PARAM);
    assert_eq!(&body[..5], &[0b0000_0010, 0b0000_0001, 0, 0, 0]);
    assert_eq!(body[5], PARAM_STRETCH);
    assert_eq!(&body[6..], &[60, 60]);
}

// ── Worm modules ──────────────────────────────────────────────

fn poke_worm_f32(board: &SimBoard, index: usize, field: &armh7link::schema::Field, v: f32) {
    board.poke_field(RecordKind::WormModule, WORM_BASE, index, field, &v.to_le_bytes());
}

#[test]
fn worm_calibration_with_only_magenc_writes_two_fields() {
    let board = SimBoard::new();
    board.poke_field(RecordKind::WormModule, WORM_BASE, 2, &worm::MODULE_TYPE, &[1]);
    board.poke_field(RecordKind::WormModule, WORM_BASE, 2, &worm::SERVO_ID, &[12]);
    board.poke_field(RecordKind::WormModule, WORM_BASE, 2, &worm::MOVE_STATE, &[3]);
    poke_worm_f32(&board, 2, &worm::GEAR_RATIO, 30.0);
    poke_worm_f32(&board, 2, &worm::LINEAR_UPPER_LIMIT, 50.0);

    let dev = device(&board);
    let calibration = WormCalibration {
        magenc_offset: Some(-5),
        ..WormCalibration::default()
    };
    let record = dev.send_worm_calibration(2, &calibration).unwrap();

    assert_eq!(board.writes().len(), 2);
    assert_eq!(record.get(&worm::MOVE_STATE).unwrap(), Value::UInt8(0));
    assert_eq!(record.get(&worm::MAGENC_INIT).unwrap(), Value::UInt16(16379));
    assert_eq!(record.get(&worm::MODULE_TYPE).unwrap(), Value::UInt8(1));
    assert_eq!(record.get(&worm::SERVO_ID).unwrap(), Value::UInt8(12));
    assert_eq!(record.get(&worm::GEAR_RATIO).unwrap(), Value::Float32(30.0));
    assert_eq!(record.get(&worm::LINEAR_UPPER_LIMIT).unwrap(), Value::Float32(50.0));
}

#[test]
fn factory_worm_calibration_stores_defaults() {
    let board = SimBoard::new();
    let dev = device(&board);
    let calibration = WormCalibration::factory()
        .module_type(1)
        .servo_idx(12)
        .sensor_idx(3)
        .magenc_offset(1000);
    let record = dev.send_worm_calibration(0, &calibration).unwrap();

    assert_eq!(board.writes().len(), 9);
    assert_eq!(record.get(&worm::SENSOR_ID).unwrap(), Value::UInt8(3));
    assert_eq!(record.get(&worm::MAGENC_INIT).unwrap(), Value::UInt16(1000));
    assert_eq!(record.get(&worm::LINEAR_UPPER_LIMIT).unwrap(), Value::Float32(69.0));
    assert_eq!(record.get(&worm::THRESHOLD_SCALE).unwrap(), Value::Float32(5.0));
    assert_eq!(record.get(&worm::TIMEOUT_TIME_SCALE).unwrap(), Value::Float32(1.25));
    assert_eq!(record.get(&worm::GEAR_RATIO).unwrap(), Value::Float32(20.0));
    assert_eq!(dev.search_worm_ids().unwrap(), vec![0]);
}

#[test]
fn worm_index_out_of_range() {
    let board = SimBoard::new();
    let dev = device(&board);
    assert!(matches!(
        dev.send_worm_calibration(20, &WormCalibration::default()),
        Err(Error::InvalidIndex { index: 20, limit: 20, .. })
    ));
    assert!(matches!(
        dev.read_worm_angle(25),
        Err(Error::InvalidIndex { .. })
    ));
    assert!(board.requests().is_empty());
}

#[test]
fn worm_angle_reads_present_angle() {
    let board = SimBoard::new();
    board.poke_field(RecordKind::WormModule, WORM_BASE, 1, &worm::MODULE_TYPE, &[1]);
    poke_worm_f32(&board, 1, &worm::PRESENT_ANGLE, -42.5);
    let dev = device(&board);
    assert_eq!(dev.read_worm_angle(1).unwrap(), -42.5);
}

#[test]
fn worm_drive_sets_targets_then_moves_linked_servo() {
    let board = SimBoard::new();
    board.poke_field(RecordKind::WormModule, WORM_BASE, 1, &worm::SERVO_ID, &[12]);
    let dev = device(&board);

    let record = dev
        .send_worm_angle_and_threshold(1, 45.0, 30.0, 1.5, -1.0)
        .unwrap();
    assert_eq!(record.get(&worm::REF_ANGLE).unwrap(), Value::Float32(45.0));
    assert_eq!(record.get(&worm::THRESHOLD).unwrap(), Value::Float32(30.0));
    assert_eq!(record.get(&worm::THRESHOLD_SCALE).unwrap(), Value::Float32(1.5));

    let (command, body) = commands(&board).pop().unwrap();
    assert_eq!(command, CMD_MULTI_SERVO_SINGLE_VELOCITY);
    assert_eq!(&body[..5], &[0, 0b0001_0000, 0, 0, 0]);
    assert_eq!(body[5], 10);
    assert_eq!(&body[6..], &3450u16.to_le_bytes());
}

// ── IMU ───────────────────────────────────────────────────────

#[test]
fn orientation_from_madgwick_record() {
    let board = SimBoard::new();
    let put = |field: &armh7link::schema::Field, at: usize, v: f32| {
        board.poke(IMU_BASE + u32::from(field.offset) + 4 * at as u32, &v.to_le_bytes());
    };
    put(&imu::Q0, 0, 0.5);
    put(&imu::Q3, 0, -0.5);
    put(&imu::YAW, 0, 90.0);
    put(&imu::GYRO, 0, 2.0);
    put(&imu::GYRO, 1, 3.0);
    put(&imu::GYRO, 2, 6.0);

    let dev = device(&board);
    assert_eq!(dev.read_quaternion().unwrap(), [0.5, 0.0, 0.0, -0.5]);
    assert_eq!(dev.read_rpy().unwrap(), [0.0, 0.0, 90.0]);
    let (norm, gyro) = dev.gyro_norm().unwrap();
    assert_eq!(gyro, [2.0, 3.0, 6.0]);
    assert!((norm - 7.0).abs() < 1e-6);
}

// ── Sensors ───────────────────────────────────────────────────

#[test]
fn jointbase_sensor_ids_outside_40_to_59_rejected() {
    let board = SimBoard::new();
    let dev = device(&board);
    for id in [0, 39, 60] {
        assert!(matches!(
            dev.read_jointbase_sensor(id),
            Err(Error::InvalidIndex { .. })
        ));
    }
    assert!(dev.read_jointbase_sensor(59).is_ok());
}

// ── Firmware calls ────────────────────────────────────────────

#[test]
fn write_to_flash_records_data_segment_then_calls_firmware() {
    let board = SimBoard::new();
    let dev = device(&board);
    dev.write_to_flash().unwrap();

    let word = |offset: u32| {
        let b = board.peek(DATA_ADDRESS_BASE + offset, 4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    };
    assert_eq!(word(0), SIDATA);
    assert_eq!(word(4), SDATA);
    assert_eq!(word(8), EDATA);
    assert_eq!(word(12), UW_TICK_PRIO - SDATA);

    let requests = board.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(
        requests.last(),
        Some(&Seen::Call {
            address: symbols().resolve("rom_to_flash").unwrap(),
            args: vec![]
        })
    );
}

#[test]
fn buzzer_calls_init_sound() {
    let board = SimBoard::new();
    let dev = device(&board);
    dev.buzzer().unwrap();
    assert_eq!(
        board.requests(),
        vec![Seen::Call {
            address: symbols().resolve("buzzer_init_sound").unwrap(),
            args: vec![]
        }]
    );
}
