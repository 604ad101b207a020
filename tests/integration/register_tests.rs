//! Register accessor against the simulated board: record addressing,
//! slot-vector access and single-field writes.

use armh7link::error::Error;
use armh7link::schema::{
    Field, NumericType, RecordKind, StructSchema, Value, data_address, servo, worm,
};

use super::mock_device::{DATA_ADDRESS_BASE, SERVO_BASE, Seen, SimBoard, WORM_BASE, device};

#[test]
fn record_reads_hit_base_plus_index_times_size() {
    let board = SimBoard::new();
    let dev = device(&board);
    for kind in RecordKind::ALL {
        let schema = kind.schema();
        let base = dev.registers().base(schema).unwrap();
        for index in [0, schema.array_length as usize - 1] {
            board.clear_requests();
            dev.registers().read_record(schema, index).unwrap();
            assert_eq!(
                board.requests(),
                vec![Seen::Read {
                    address: base + index as u32 * u32::from(schema.record_size),
                    count: 1,
                    element_size: schema.record_size as u8,
                    stride: 0,
                }],
                "{} #{index}",
                schema.name
            );
        }
    }
}

#[test]
fn record_index_past_array_is_rejected() {
    let board = SimBoard::new();
    let dev = device(&board);
    let err = dev
        .registers()
        .read_record(RecordKind::Servo.schema(), 36)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIndex { index: 36, limit: 36, .. }));
    assert!(board.requests().is_empty());
}

#[test]
fn single_field_round_trips() {
    let board = SimBoard::new();
    let dev = device(&board);
    let regs = dev.registers();
    let worm_schema = RecordKind::WormModule.schema();
    let servo_schema = RecordKind::Servo.schema();

    regs.write_single_field(worm_schema, 4, &worm::REF_ANGLE, 12.25).unwrap();
    regs.write_single_field(worm_schema, 4, &worm::SERVO_ID, 7.0).unwrap();
    regs.write_single_field(servo_schema, 9, &servo::REF_ANGLE, 7600.4).unwrap();

    let worm_rec = regs.read_record(worm_schema, 4).unwrap();
    assert_eq!(worm_rec.get(&worm::REF_ANGLE).unwrap(), Value::Float32(12.25));
    assert_eq!(worm_rec.get(&worm::SERVO_ID).unwrap(), Value::UInt8(7));
    assert_eq!(worm_rec.get(&worm::THRESHOLD).unwrap(), Value::Float32(0.0));

    let servo_rec = regs.read_record(servo_schema, 9).unwrap();
    assert_eq!(servo_rec.get(&servo::REF_ANGLE).unwrap(), Value::UInt16(7600));
}

#[test]
fn single_field_write_touches_only_its_bytes() {
    let board = SimBoard::new();
    board.poke(WORM_BASE + 36, &[0xAA; 36]);
    let dev = device(&board);
    dev.registers()
        .write_single_field(RecordKind::WormModule.schema(), 1, &worm::MOVE_STATE, 0.0)
        .unwrap();

    let after = board.peek(WORM_BASE + 36, 36);
    assert_eq!(after[3], 0);
    assert!(after.iter().enumerate().all(|(i, b)| i == 3 || *b == 0xAA));
    assert_eq!(
        board.writes(),
        vec![Seen::Write {
            address: WORM_BASE + 36 + 3,
            count: 1,
            element_size: 1,
            stride: 0,
            payload: vec![0],
        }]
    );
}

#[test]
fn slot_vector_read_is_one_strided_request() {
    let board = SimBoard::new();
    for i in 0..36u16 {
        board.poke_field(RecordKind::Servo, SERVO_BASE, i as usize, &servo::CURRENT_ANGLE, &(7000 + i).to_le_bytes());
    }
    let dev = device(&board);
    let angles = dev.angle_vector().unwrap();
    assert_eq!(angles, (7000..7036).collect::<Vec<u16>>());
    assert_eq!(
        board.requests(),
        vec![Seen::Read {
            address: SERVO_BASE + 6,
            count: 36,
            element_size: 2,
            stride: 80,
        }]
    );
}

#[test]
fn slot_vector_write_rounds_integers_and_strides_records() {
    let board = SimBoard::new();
    let dev = device(&board);
    let values: Vec<f64> = (0..36).map(|i| 7499.6 + f64::from(i)).collect();
    dev.registers()
        .write_field_across_array(RecordKind::Servo.schema(), &servo::REF_ANGLE, &values)
        .unwrap();

    for i in 0..36usize {
        let raw = board.peek_field(RecordKind::Servo, SERVO_BASE, i, &servo::REF_ANGLE);
        assert_eq!(u16::from_le_bytes([raw[0], raw[1]]), 7500 + i as u16);
    }
    assert_eq!(dev.reference_angle_vector().unwrap()[35], 7535);
}

#[test]
fn slot_vector_write_packs_floats_at_width() {
    let board = SimBoard::new();
    let dev = device(&board);
    let values: Vec<f64> = (0..20).map(|i| f64::from(i) * 1.5).collect();
    dev.registers()
        .write_field_across_array(RecordKind::WormModule.schema(), &worm::THRESHOLD, &values)
        .unwrap();

    match &board.writes()[..] {
        [Seen::Write { count, element_size, stride, payload, .. }] => {
            assert_eq!((*count, *element_size, *stride), (20, 4, 36));
            assert_eq!(payload.len(), 80);
        }
        other => panic!("unexpected requests {other:?}"),
    }
    let read = dev
        .registers()
        .read_field_across_array(RecordKind::WormModule.schema(), &worm::THRESHOLD)
        .unwrap();
    assert_eq!(read[7], Value::Float32(10.5));
}

static WIDE_SERVO: StructSchema = StructSchema {
    name: "WideServo",
    symbol: "servo_vector",
    record_size: 80,
    fields: &[WIDE],
    array_length: 36,
};
const WIDE: Field = Field::scalar("position_f64", 16, NumericType::Float64);

#[test]
fn oversized_vector_write_fails_before_sending() {
    let board = SimBoard::new();
    let dev = device(&board);
    let err = dev
        .registers()
        .write_field_across_array(&WIDE_SERVO, &WIDE, &[0.0; 36])
        .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge { frame_len: 299, limit: 240 }));
    assert!(board.requests().is_empty());
}

#[test]
fn oversized_flat_write_fails_before_sending() {
    let board = SimBoard::new();
    let dev = device(&board);
    let err = dev.registers().memory_write(SERVO_BASE, &[0; 230]).unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge { frame_len: 241, .. }));
    assert!(board.requests().is_empty());
}

#[test]
fn int32_single_field_write_is_unsupported() {
    let board = SimBoard::new();
    let dev = device(&board);
    let err = dev
        .registers()
        .write_single_field(RecordKind::DataAddress.schema(), 0, &data_address::EDATA, 1.0)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedFieldType { numeric_type: NumericType::Int32, .. }
    ));
    assert!(board.requests().is_empty());
    assert_eq!(board.peek(DATA_ADDRESS_BASE, 16), vec![0; 16]);
}
