//! Discovery scans and their caches.

use armh7link::schema::{RecordKind, sensor, servo, worm};

use super::mock_device::{SENSOR_BASE, SERVO_BASE, Seen, SimBoard, WORM_BASE, device};

fn set_servo(board: &SimBoard, index: usize, field: &armh7link::schema::Field, value: u8) {
    board.poke_field(RecordKind::Servo, SERVO_BASE, index, field, &[value]);
}

#[test]
fn servo_scan_finds_flagged_records_in_order() {
    let board = SimBoard::new();
    for index in [9, 2, 5] {
        set_servo(&board, index, &servo::FLAG, 1);
    }
    let dev = device(&board);
    assert_eq!(dev.search_servo_ids().unwrap(), vec![2, 5, 9]);
    assert_eq!(dev.search_servo_ids().unwrap(), vec![2, 5, 9]);
}

#[test]
fn servo_ids_are_cached_until_invalidated() {
    let board = SimBoard::new();
    set_servo(&board, 3, &servo::FLAG, 1);
    let dev = device(&board);

    assert_eq!(dev.servo_sorted_ids().unwrap(), vec![3]);
    set_servo(&board, 4, &servo::FLAG, 1);
    board.clear_requests();
    assert_eq!(dev.servo_sorted_ids().unwrap(), vec![3]);
    assert!(board.requests().is_empty());

    dev.invalidate_caches();
    assert!(dev.cached().servo_ids.is_none());
    assert_eq!(dev.servo_sorted_ids().unwrap(), vec![3, 4]);
}

#[test]
fn wheel_scan_marks_rotation_and_clears_feedback() {
    let board = SimBoard::new();
    for index in [1, 4, 7] {
        set_servo(&board, index, &servo::FLAG, 1);
    }
    set_servo(&board, 4, &servo::ROTATION, 1);
    set_servo(&board, 7, &servo::ROTATION, 1);
    set_servo(&board, 10, &servo::ROTATION, 1);
    set_servo(&board, 1, &servo::FEEDBACK, 1);
    set_servo(&board, 4, &servo::FEEDBACK, 1);
    set_servo(&board, 10, &servo::FEEDBACK, 1);

    let dev = device(&board);
    assert_eq!(dev.search_wheel_ids().unwrap(), vec![4, 7]);

    let feedback = |i| board.peek_field(RecordKind::Servo, SERVO_BASE, i, &servo::FEEDBACK)[0];
    assert_eq!(feedback(1), 0);
    assert_eq!(feedback(4), 0);
    assert_eq!(feedback(10), 1, "undiscovered servo left alone");
    assert_eq!(board.writes().len(), 2);
    assert_eq!(dev.wheel_servo_ids().unwrap(), vec![4, 7]);
}

#[test]
fn worm_scan_matches_actuator_type_only() {
    let board = SimBoard::new();
    board.poke_field(RecordKind::WormModule, WORM_BASE, 0, &worm::MODULE_TYPE, &[1]);
    board.poke_field(RecordKind::WormModule, WORM_BASE, 3, &worm::MODULE_TYPE, &[1]);
    board.poke_field(RecordKind::WormModule, WORM_BASE, 5, &worm::MODULE_TYPE, &[2]);
    let dev = device(&board);
    assert_eq!(dev.search_worm_ids().unwrap(), vec![0, 3]);
    assert_eq!(
        board.requests(),
        vec![Seen::Read {
            address: WORM_BASE,
            count: 20,
            element_size: 1,
            stride: 36,
        }]
    );
}

#[test]
fn sensor_scan_requires_port_and_matching_id() {
    let board = SimBoard::new();
    let put = |index: usize, port: u8, id: u8| {
        board.poke_field(RecordKind::Sensor, SENSOR_BASE, index, &sensor::PORT, &[port]);
        board.poke_field(RecordKind::Sensor, SENSOR_BASE, index, &sensor::ID, &[id]);
    };
    put(0, 1, 20);
    put(3, 2, 21);
    put(4, 0, 22);
    put(6, 1, 99);

    let dev = device(&board);
    assert_eq!(dev.jointbase_sensor_ids().unwrap(), vec![40, 43]);

    let sensors = dev.all_jointbase_sensors().unwrap();
    let ids: Vec<usize> = sensors.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![40, 43]);
    assert_eq!(sensors[1].port, 2);
}

#[test]
fn rescan_refreshes_every_cache() {
    let board = SimBoard::new();
    set_servo(&board, 0, &servo::FLAG, 1);
    let dev = device(&board);
    dev.servo_sorted_ids().unwrap();

    set_servo(&board, 8, &servo::FLAG, 1);
    set_servo(&board, 8, &servo::ROTATION, 1);
    board.poke_field(RecordKind::WormModule, WORM_BASE, 2, &worm::MODULE_TYPE, &[1]);

    let cache = dev.rescan().unwrap();
    assert_eq!(cache.servo_ids, Some(vec![0, 8]));
    assert_eq!(cache.wheel_ids, Some(vec![8]));
    assert_eq!(cache.worm_ids, Some(vec![2]));
    assert_eq!(cache.sensor_ids, Some(vec![]));
}
