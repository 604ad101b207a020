//! Fuzz target: record decoding
//!
//! Interprets arbitrary bytes as each record kind and decodes every field.
//! Wrong-sized buffers must be rejected, never panic.
//!
//! cargo fuzz run fuzz_record_decode

#![no_main]

use armh7link::schema::{Record, RecordKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for kind in RecordKind::ALL {
        let schema = kind.schema();
        let Ok(record) = Record::new(schema, data.to_vec()) else {
            assert_ne!(data.len(), usize::from(schema.record_size));
            continue;
        };
        for field in schema.fields {
            if field.is_scalar() {
                let _ = record.get(field).unwrap();
            } else {
                assert_eq!(record.get_array(field).unwrap().len(), field.count as usize);
            }
        }
    }
});
