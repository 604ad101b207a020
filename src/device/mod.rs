//! Device facade: the board's domain operations.
//!
//! [`Armh7Device`] owns a [`RegisterAccessor`] and the session's discovery
//! caches.  Everything here is built from symbol lookups, record schemas
//! and the four request kinds; nothing talks to the transport directly.
//!
//! ```text
//!  caller ──▶ ┌──────────────────────────┐
//!             │       Armh7Device         │
//!             │ discovery · servo · worm  │
//!             │ imu · sensors · flash     │
//!             └────────────┬─────────────┘
//!                          ▼
//!             ┌──────────────────────────┐
//!             │    RegisterAccessor       │──▶ Link ──▶ Transport
//!             └──────────────────────────┘
//! ```

pub mod command;
pub mod eeprom;
pub mod imu;
pub mod registers;
pub mod sensor;
pub mod worm;

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::error::{Error, Result};
use crate::protocol::checksum::{Checksum, SumChecksum};
use crate::protocol::codec::ACK_OK;
use crate::protocol::transport::{Link, Transport};
use crate::schema::{
    Field, MAX_SENSOR_NUM, Record, RecordKind, SENSOR_INDEX_BASE, Value, data_address, sensor as sensor_fields,
    servo, worm as worm_fields,
};
use crate::symbols::SymbolTable;

use command::{
    CMD_MULTI_SERVO_SINGLE_VELOCITY, CMD_SERVO_PARAM, DEFAULT_VELOCITY, FREE_POSITION,
    HOLD_POSITION, NEUTRAL_POSITION,
};
use eeprom::EepromParam;
use imu::Orientation;
use registers::RegisterAccessor;
use sensor::JointBaseSensor;
use worm::{WORM_DRIVE_VELOCITY, WormCalibration};

/// Memoized scan results.  `None` means "not scanned yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryCache {
    pub servo_ids: Option<Vec<usize>>,
    pub wheel_ids: Option<Vec<usize>>,
    pub worm_ids: Option<Vec<usize>>,
    pub sensor_ids: Option<Vec<usize>>,
}

pub struct Armh7Device<T, C = SumChecksum> {
    registers: RegisterAccessor<T, C>,
    cache: Mutex<DiscoveryCache>,
}

impl<T: Transport> Armh7Device<T, SumChecksum> {
    pub fn new(link: Link<T>, symbols: SymbolTable) -> Self {
        Self::from_accessor(RegisterAccessor::new(link, symbols))
    }
}

impl<T: Transport, C: Checksum> Armh7Device<T, C> {
    pub fn from_accessor(registers: RegisterAccessor<T, C>) -> Self {
        Self {
            registers,
            cache: Mutex::new(DiscoveryCache::default()),
        }
    }

    pub fn registers(&self) -> &RegisterAccessor<T, C> {
        &self.registers
    }

    pub fn into_registers(self) -> RegisterAccessor<T, C> {
        self.registers
    }

    fn cache(&self) -> MutexGuard<'_, DiscoveryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the discovery caches.
    pub fn cached(&self) -> DiscoveryCache {
        self.cache().clone()
    }

    // ── Liveness ─────────────────────────────────────────────

    /// Send the ack probe and return the raw reply payload.
    pub fn ack(&self) -> Result<Vec<u8>> {
        self.registers.ack()
    }

    /// `true` when the board answers the ack probe with `0x06`.
    pub fn check_ack(&self) -> Result<bool> {
        Ok(self.ack()?.get(1) == Some(&ACK_OK))
    }

    // ── Discovery ────────────────────────────────────────────

    /// Scan the servo array; a nonzero `flag` marks a present servo.
    pub fn search_servo_ids(&self) -> Result<Vec<usize>> {
        let flags = self
            .registers
            .read_field_across_array(RecordKind::Servo.schema(), &servo::FLAG)?;
        let ids = nonzero_indices(&flags);
        info!("Servos present: {ids:?}");
        self.cache().servo_ids = Some(ids.clone());
        Ok(ids)
    }

    /// Discovered servo IDs, scanning on first use.
    pub fn servo_sorted_ids(&self) -> Result<Vec<usize>> {
        if let Some(ids) = self.cache().servo_ids.clone() {
            return Ok(ids);
        }
        self.search_servo_ids()
    }

    /// Among discovered servos, a nonzero `rotation` marks a wheel.
    ///
    /// Any discovered servo with its `feedback` flag set has it cleared.
    pub fn search_wheel_ids(&self) -> Result<Vec<usize>> {
        let servos = self.servo_sorted_ids()?;
        let schema = RecordKind::Servo.schema();
        let rotation = self
            .registers
            .read_field_across_array(schema, &servo::ROTATION)?;
        let feedback = self
            .registers
            .read_field_across_array(schema, &servo::FEEDBACK)?;

        let mut wheels = Vec::new();
        for &id in &servos {
            if rotation.get(id).is_some_and(|v| v.as_i64() > 0) {
                wheels.push(id);
            }
            if feedback.get(id).is_some_and(|v| v.as_i64() > 0) {
                self.registers
                    .write_single_field(schema, id, &servo::FEEDBACK, 0.0)?;
            }
        }
        info!("Wheel servos: {wheels:?}");
        self.cache().wheel_ids = Some(wheels.clone());
        Ok(wheels)
    }

    pub fn wheel_servo_ids(&self) -> Result<Vec<usize>> {
        if let Some(ids) = self.cache().wheel_ids.clone() {
            return Ok(ids);
        }
        self.search_wheel_ids()
    }

    /// Scan the worm-module array for `module_type == 1`.
    pub fn search_worm_ids(&self) -> Result<Vec<usize>> {
        let types = self
            .registers
            .read_field_across_array(RecordKind::WormModule.schema(), &worm_fields::MODULE_TYPE)?;
        let ids: Vec<usize> = types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.as_i64() == i64::from(worm_fields::WORM_ACTUATOR))
            .map(|(i, _)| i)
            .collect();
        info!("Worm modules: {ids:?}");
        self.cache().worm_ids = Some(ids.clone());
        Ok(ids)
    }

    pub fn worm_sorted_ids(&self) -> Result<Vec<usize>> {
        if let Some(ids) = self.cache().worm_ids.clone() {
            return Ok(ids);
        }
        self.search_worm_ids()
    }

    /// Scan the sensor array; returns host-side sensor IDs (index + 40).
    pub fn search_jointbase_sensor_ids(&self) -> Result<Vec<usize>> {
        let schema = RecordKind::Sensor.schema();
        let ports = self.registers.read_field_across_array(schema, &sensor_fields::PORT)?;
        let stored = self.registers.read_field_across_array(schema, &sensor_fields::ID)?;
        let mut ids: Vec<usize> = ports
            .iter()
            .zip(&stored)
            .enumerate()
            .filter(|(i, (port, id))| sensor::is_valid_slot(*i, **port, **id))
            .map(|(i, _)| i + SENSOR_INDEX_BASE)
            .collect();
        ids.sort_unstable();
        info!("Joint-base sensors: {ids:?}");
        self.cache().sensor_ids = Some(ids.clone());
        Ok(ids)
    }

    pub fn jointbase_sensor_ids(&self) -> Result<Vec<usize>> {
        if let Some(ids) = self.cache().sensor_ids.clone() {
            return Ok(ids);
        }
        self.search_jointbase_sensor_ids()
    }

    /// Forget every scan result.
    pub fn invalidate_caches(&self) {
        *self.cache() = DiscoveryCache::default();
    }

    /// Re-run every scan.
    pub fn rescan(&self) -> Result<DiscoveryCache> {
        self.invalidate_caches();
        self.search_servo_ids()?;
        self.search_wheel_ids()?;
        self.search_worm_ids()?;
        self.search_jointbase_sensor_ids()?;
        Ok(self.cached())
    }

    // ── Servo angles ─────────────────────────────────────────

    /// Current angle of every servo slot.
    pub fn angle_vector(&self) -> Result<Vec<u16>> {
        self.servo_u16_slots(&servo::CURRENT_ANGLE)
    }

    /// Commanded angle of every servo slot.
    pub fn reference_angle_vector(&self) -> Result<Vec<u16>> {
        self.servo_u16_slots(&servo::REF_ANGLE)
    }

    fn servo_u16_slots(&self, field: &'static Field) -> Result<Vec<u16>> {
        let values = self
            .registers
            .read_field_across_array(RecordKind::Servo.schema(), field)?;
        Ok(values.iter().map(|v| v.as_i64() as u16).collect())
    }

    /// Move `ids` to `positions` at one shared velocity.
    pub fn servo_angle_vector(
        &self,
        ids: &[usize],
        positions: &[f64],
        velocity: f64,
    ) -> Result<Vec<u8>> {
        let body = command::angle_vector_body(ids, positions, velocity)?;
        self.registers
            .command(CMD_MULTI_SERVO_SINGLE_VELOCITY, &body)
    }

    fn sentinel(&self, ids: Option<&[usize]>, position: f64, velocity: f64) -> Result<Vec<u8>> {
        let ids = self.ids_or_discovered(ids)?;
        let positions = vec![position; ids.len()];
        self.servo_angle_vector(&ids, &positions, velocity)
    }

    /// Lock servos at their current angle.  `None` means every discovered
    /// servo.
    pub fn hold(&self, ids: Option<&[usize]>) -> Result<Vec<u8>> {
        self.sentinel(ids, HOLD_POSITION, DEFAULT_VELOCITY)
    }

    /// Release servos.
    pub fn free(&self, ids: Option<&[usize]>) -> Result<Vec<u8>> {
        self.sentinel(ids, FREE_POSITION, DEFAULT_VELOCITY)
    }

    /// Drive servos to the mechanical centre.
    pub fn neutral(&self, ids: Option<&[usize]>, velocity: f64) -> Result<Vec<u8>> {
        self.sentinel(ids, NEUTRAL_POSITION, velocity)
    }

    fn ids_or_discovered(&self, ids: Option<&[usize]>) -> Result<Vec<usize>> {
        match ids {
            Some(ids) => Ok(ids.to_vec()),
            None => self.servo_sorted_ids(),
        }
    }

    // ── EEPROM parameters ────────────────────────────────────

    /// Decode EEPROM parameters of servo `id`.  An empty `params` selects
    /// every known parameter.
    pub fn servo_params(&self, id: usize, params: &[EepromParam]) -> Result<Vec<(EepromParam, u32)>> {
        let record = self.registers.read_record(RecordKind::Servo.schema(), id)?;
        let image: Vec<u8> = record
            .get_array(&servo::PARAMS)?
            .iter()
            .map(|v| v.as_i64() as u8)
            .collect();
        let selected = if params.is_empty() {
            &EepromParam::ALL[..]
        } else {
            params
        };
        selected
            .iter()
            .map(|&p| {
                p.decode(&image)
                    .map(|v| (p, v))
                    .ok_or(Error::LengthMismatch {
                        expected: servo::PARAMS.count as usize,
                        actual: image.len(),
                    })
            })
            .collect()
    }

    /// Stretch of each servo: half its EEPROM stretch gain.
    pub fn read_stretch(&self, ids: Option<&[usize]>) -> Result<Vec<u32>> {
        self.ids_or_discovered(ids)?
            .into_iter()
            .map(|id| -> Result<u32> {
                let params = self.servo_params(id, &[EepromParam::StretchGain])?;
                Ok(params.first().map_or(0, |(_, gain)| gain / 2))
            })
            .collect()
    }

    /// Set the same stretch on every servo in `ids`.
    pub fn send_stretch(&self, value: f64, ids: Option<&[usize]>) -> Result<Vec<u8>> {
        let ids = self.ids_or_discovered(ids)?;
        let values = vec![value; ids.len()];
        let body = command::stretch_body(&ids, &values)?;
        self.registers.command(CMD_SERVO_PARAM, &body)
    }

    // ── Worm modules ─────────────────────────────────────────

    fn check_worm_index(idx: usize) -> Result<()> {
        RecordKind::WormModule.schema().check_index(idx)
    }

    /// Write calibration values into worm module `idx` and return the
    /// record as stored afterwards.
    pub fn send_worm_calibration(&self, idx: usize, calibration: &WormCalibration) -> Result<Record> {
        Self::check_worm_index(idx)?;
        info!("Calibrating worm {idx}: {calibration:?}");
        let schema = RecordKind::WormModule.schema();
        for (field, value) in calibration.writes() {
            self.registers.write_single_field(schema, idx, field, value)?;
        }
        self.registers.read_record(schema, idx)
    }

    /// Present angle of worm module `idx`.
    pub fn read_worm_angle(&self, idx: usize) -> Result<f32> {
        Self::check_worm_index(idx)?;
        if !self.worm_sorted_ids()?.contains(&idx) {
            warn!("Worm module {idx} is not among the discovered modules");
        }
        let record = self
            .registers
            .read_record(RecordKind::WormModule.schema(), idx)?;
        Ok(record.f64(&worm_fields::PRESENT_ANGLE)? as f32)
    }

    /// Set the target angle and stall threshold of worm module `idx`, then
    /// drive its servo in direction `sign`.  Returns the updated record.
    pub fn send_worm_angle_and_threshold(
        &self,
        idx: usize,
        angle: f64,
        threshold: f64,
        threshold_scale: f64,
        sign: f64,
    ) -> Result<Record> {
        Self::check_worm_index(idx)?;
        let schema = RecordKind::WormModule.schema();
        let before = self.registers.read_record(schema, idx)?;
        let servo_id = before.i64(&worm_fields::SERVO_ID)? as usize;

        self.registers
            .write_single_field(schema, idx, &worm_fields::REF_ANGLE, angle)?;
        self.registers
            .write_single_field(schema, idx, &worm_fields::THRESHOLD, threshold)?;
        self.registers.write_single_field(
            schema,
            idx,
            &worm_fields::THRESHOLD_SCALE,
            threshold_scale,
        )?;
        self.servo_angle_vector(&[servo_id], &[worm::drive_target(sign)], WORM_DRIVE_VELOCITY)?;
        self.registers.read_record(schema, idx)
    }

    // ── IMU ──────────────────────────────────────────────────

    pub fn read_orientation(&self) -> Result<Orientation> {
        let record = self.registers.read_record(RecordKind::Imu.schema(), 0)?;
        Orientation::from_record(&record)
    }

    pub fn read_quaternion(&self) -> Result<[f32; 4]> {
        Ok(self.read_orientation()?.quaternion)
    }

    pub fn read_rpy(&self) -> Result<[f32; 3]> {
        Ok(self.read_orientation()?.rpy())
    }

    /// Gyro norm together with the vector it was computed from.
    pub fn gyro_norm(&self) -> Result<(f32, [f32; 3])> {
        let o = self.read_orientation()?;
        Ok((o.gyro_norm(), o.gyro))
    }

    // ── Joint-base sensors ───────────────────────────────────

    /// Read the sensor with host-side ID `id` (40..60).
    pub fn read_jointbase_sensor(&self, id: usize) -> Result<JointBaseSensor> {
        let limit = SENSOR_INDEX_BASE + MAX_SENSOR_NUM as usize;
        let index = id
            .checked_sub(SENSOR_INDEX_BASE)
            .filter(|_| id < limit)
            .ok_or(Error::InvalidIndex {
                what: "joint-base sensor id",
                index: id,
                limit,
            })?;
        let record = self.registers.read_record(RecordKind::Sensor.schema(), index)?;
        JointBaseSensor::from_record(index, &record)
    }

    /// Every discovered joint-base sensor, in ID order.
    pub fn all_jointbase_sensors(&self) -> Result<Vec<JointBaseSensor>> {
        self.jointbase_sensor_ids()?
            .into_iter()
            .map(|id| self.read_jointbase_sensor(id))
            .collect()
    }

    // ── Firmware calls ───────────────────────────────────────

    /// Store the data-segment bounds in the `data_address` record read by
    /// the firmware's flash routine.
    pub fn set_data_address(&self) -> Result<()> {
        let symbols = self.registers.symbols();
        let sidata = symbols.resolve("_sidata")?;
        let sdata = symbols.resolve("_sdata")?;
        let edata = symbols.resolve("_edata")?;
        let data_end = symbols.resolve("uwTickPrio")?;
        let data_size = i64::from(data_end) - i64::from(sdata);

        let schema = RecordKind::DataAddress.schema();
        for (field, value) in [
            (&data_address::SIDATA, f64::from(sidata)),
            (&data_address::SDATA, f64::from(sdata)),
            (&data_address::EDATA, f64::from(edata)),
            (&data_address::DATA_SIZE, data_size as f64),
        ] {
            self.registers
                .write_field_across_array(schema, field, &[value])?;
        }
        info!("Data segment 0x{sdata:08X} ({data_size} bytes) from 0x{sidata:08X}");
        Ok(())
    }

    /// Persist the board's RAM parameters to flash.
    pub fn write_to_flash(&self) -> Result<Vec<u8>> {
        self.set_data_address()?;
        self.registers.call_function("rom_to_flash", &[])
    }

    /// Play the start-up tune.
    pub fn buzzer(&self) -> Result<Vec<u8>> {
        self.registers.call_function("buzzer_init_sound", &[])
    }
}

fn nonzero_indices(values: &[Value]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.as_i64() > 0)
        .map(|(i, _)| i)
        .collect()
}
