//! Fuzz target: `ResponseAssembler::feed`
//!
//! Splits arbitrary bytes into pieces at positions chosen by the first
//! input byte and feeds them in order.  The assembler must never panic,
//! must only yield frames whose first byte equals their length, and must
//! accept a fresh frame after a reset.
//!
//! cargo fuzz run fuzz_response_assembler

#![no_main]

use armh7link::protocol::codec::{MAX_FRAME_LEN, ResponseAssembler, strip_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&piece, rest)) = data.split_first() else {
        return;
    };
    let piece = usize::from(piece.max(1));

    let mut assembler = ResponseAssembler::new();
    for chunk in rest.chunks(piece) {
        match assembler.feed(chunk) {
            Ok(Some(frame)) => {
                assert_eq!(usize::from(frame[0]), frame.len());
                assert!(frame.len() <= MAX_FRAME_LEN);
                assert_eq!(strip_frame(frame).len(), frame.len() - 2);
                break;
            }
            Ok(None) => assert!(assembler.needed() > 0),
            Err(_) => break,
        }
    }

    assembler.reset();
    assert_eq!(assembler.buffered(), 0);
    assert!(matches!(assembler.feed(&[2, 0]), Ok(Some(_))));
});
