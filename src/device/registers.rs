//! Typed register access over the link.
//!
//! [`RegisterAccessor`] turns symbol names and record schemas into
//! vector-read/write and call requests.  It owns the session's link behind
//! a mutex so that concurrent callers never interleave two exchanges: every
//! method holds the lock for the whole logical operation, chunked reads
//! included.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::{Error, FrameError, Result};
use crate::protocol::checksum::{Checksum, SumChecksum};
use crate::protocol::chunked::plan_reads;
use crate::protocol::codec::{MAX_READ_PAYLOAD, MAX_WRITE_FRAME_LEN, Request, VECTOR_OVERHEAD};
use crate::protocol::transport::{Link, Transport};
use crate::schema::{Field, NumericType, Record, StructSchema, Value};
use crate::symbols::SymbolTable;

pub struct RegisterAccessor<T, C = SumChecksum> {
    link: Mutex<Link<T, C>>,
    symbols: SymbolTable,
}

impl<T: Transport, C: Checksum> RegisterAccessor<T, C> {
    pub fn new(link: Link<T, C>, symbols: SymbolTable) -> Self {
        Self {
            link: Mutex::new(link),
            symbols,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Address of record 0 of `schema`.
    pub fn base(&self, schema: &StructSchema) -> Result<u32> {
        self.symbols.resolve(schema.symbol)
    }

    // A poisoned lock only means another caller panicked mid-exchange;
    // the link resets its reassembly state at the start of every read.
    fn link(&self) -> MutexGuard<'_, Link<T, C>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the link.
    pub fn with_link<R>(&self, f: impl FnOnce(&mut Link<T, C>) -> R) -> R {
        f(&mut self.link())
    }

    pub fn into_link(self) -> Link<T, C> {
        self.link.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Raw requests ─────────────────────────────────────────

    /// Send the ack probe and return the reply payload.
    pub fn ack(&self) -> Result<Vec<u8>> {
        self.link().transact(&Request::Ack)
    }

    /// Send a board command frame `[len, command, body…, sum]`.
    pub fn command(&self, command: u8, body: &[u8]) -> Result<Vec<u8>> {
        self.link().transact(&Request::Command { command, body })
    }

    /// Call the firmware function `name` with 32-bit arguments.
    pub fn call_function(&self, name: &str, args: &[u32]) -> Result<Vec<u8>> {
        let address = self.symbols.resolve(name)?;
        debug!("call {name} @ 0x{address:08X} args={args:?}");
        self.link().transact(&Request::Call { address, args })
    }

    /// Read `len` bytes from `address`, split into requests of at most
    /// 250 bytes.  A zero-length read sends nothing.
    pub fn memory_read(&self, address: u32, len: usize) -> Result<Vec<u8>> {
        let available = u64::from(u32::MAX) - u64::from(address) + 1;
        if len as u64 > available {
            return Err(Error::InvalidIndex {
                what: "memory range",
                index: len,
                limit: available as usize,
            });
        }

        let mut link = self.link();
        let mut out = Vec::with_capacity(len);
        for chunk in plan_reads(address, len) {
            let payload = link.transact(&Request::read_flat(chunk.address, chunk.len))?;
            if payload.len() != chunk.len as usize {
                return Err(FrameError::UnexpectedPayload {
                    expected: chunk.len as usize,
                    actual: payload.len(),
                }
                .into());
            }
            out.extend_from_slice(&payload);
        }
        Ok(out)
    }

    /// Write `data` at `address` in a single request.
    pub fn memory_write(&self, address: u32, data: &[u8]) -> Result<Vec<u8>> {
        let frame_len = VECTOR_OVERHEAD + data.len();
        if frame_len > MAX_WRITE_FRAME_LEN {
            return Err(Error::PayloadTooLarge {
                frame_len,
                limit: MAX_WRITE_FRAME_LEN,
            });
        }
        self.link().transact(&Request::WriteVector {
            address,
            count: 1,
            element_size: data.len() as u8,
            stride: 0,
            payload: data,
        })
    }

    // ── Record access ────────────────────────────────────────

    /// Read record `index` of `schema` in full.
    pub fn read_record(&self, schema: &'static StructSchema, index: usize) -> Result<Record> {
        let address = schema.record_address(self.base(schema)?, index)?;
        let bytes = self.memory_read(address, schema.record_size as usize)?;
        Record::new(schema, bytes)
    }

    /// Read one scalar field from every record of `schema` in one request.
    pub fn read_field_across_array(
        &self,
        schema: &StructSchema,
        field: &'static Field,
    ) -> Result<Vec<Value>> {
        schema.check_field(field)?;
        require_scalar(field)?;
        let count = schema.array_length as usize;
        let expected = count * field.size();
        if count > u8::MAX as usize || expected > MAX_READ_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                frame_len: expected,
                limit: MAX_READ_PAYLOAD,
            });
        }

        let address = schema.field_address(self.base(schema)?, 0, field)?;
        let payload = self.link().transact(&Request::ReadVector {
            address,
            count: count as u8,
            element_size: field.size() as u8,
            stride: schema.record_size,
        })?;
        if payload.len() != expected {
            return Err(FrameError::UnexpectedPayload {
                expected,
                actual: payload.len(),
            }
            .into());
        }

        let values: Option<Vec<Value>> = payload
            .chunks_exact(field.size())
            .map(|raw| field.numeric_type.decode(raw))
            .collect();
        values.ok_or_else(|| {
            FrameError::UnexpectedPayload {
                expected,
                actual: payload.len(),
            }
            .into()
        })
    }

    /// Write one scalar field of every record of `schema` in one request.
    ///
    /// Integer types are rounded and must fit the field; floats are packed
    /// at their own width.
    /// The request is rejected before anything is sent if its frame would
    /// exceed 240 bytes.
    pub fn write_field_across_array(
        &self,
        schema: &StructSchema,
        field: &'static Field,
        values: &[f64],
    ) -> Result<Vec<u8>> {
        schema.check_field(field)?;
        require_scalar(field)?;
        let count = schema.array_length as usize;
        let frame_len = VECTOR_OVERHEAD + field.size() * count;
        if count > u8::MAX as usize || frame_len > MAX_WRITE_FRAME_LEN {
            return Err(Error::PayloadTooLarge {
                frame_len,
                limit: MAX_WRITE_FRAME_LEN,
            });
        }
        if values.len() != count {
            return Err(Error::LengthMismatch {
                expected: count,
                actual: values.len(),
            });
        }

        for &value in values {
            check_range(field, value)?;
        }

        let mut payload = vec![0u8; field.size() * count];
        for (slot, value) in payload.chunks_exact_mut(field.size()).zip(values) {
            field.numeric_type.encode(*value, slot);
        }

        let address = schema.field_address(self.base(schema)?, 0, field)?;
        self.link().transact(&Request::WriteVector {
            address,
            count: count as u8,
            element_size: field.size() as u8,
            stride: schema.record_size,
            payload: &payload,
        })
    }

    /// Write one field of record `index`.
    ///
    /// Only `Float32`, `UInt16` and `UInt8` fields are writable this way.
    /// An integer value that does not fit the field is rejected.
    pub fn write_single_field(
        &self,
        schema: &StructSchema,
        index: usize,
        field: &'static Field,
        value: f64,
    ) -> Result<Vec<u8>> {
        schema.check_field(field)?;
        let supported = matches!(
            field.numeric_type,
            NumericType::Float32 | NumericType::UInt16 | NumericType::UInt8
        );
        if !supported || !field.is_scalar() {
            return Err(unsupported(field));
        }

        check_range(field, value)?;

        let address = schema.field_address(self.base(schema)?, index, field)?;
        let mut buf = [0u8; 4];
        let raw = &mut buf[..field.size()];
        field.numeric_type.encode(value, raw);
        debug!("{}[{index}].{} <- {value}", schema.name, field.name);
        self.memory_write(address, raw)
    }
}

fn require_scalar(field: &'static Field) -> Result<()> {
    if field.is_scalar() {
        Ok(())
    } else {
        Err(unsupported(field))
    }
}

fn check_range(field: &'static Field, value: f64) -> Result<()> {
    if field.numeric_type.accepts(value) {
        Ok(())
    } else {
        Err(Error::ValueOutOfRange {
            field: field.name,
            value,
        })
    }
}

fn unsupported(field: &'static Field) -> Error {
    Error::UnsupportedFieldType {
        field: field.name,
        numeric_type: field.numeric_type,
    }
}
