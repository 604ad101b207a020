//! Host side of the board's RAM access protocol.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                       │
//! │                                                          │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────────────┐  │
//! │  │ Request  │──▶│  Codec   │──▶│  Link (write frame)  │  │
//! │  │ (typed)  │   │ (+ sum)  │   │  → Transport         │  │
//! │  └──────────┘   └──────────┘   └──────────────────────┘  │
//! │                                           │              │
//! │  ┌──────────┐   ┌──────────┐              ▼              │
//! │  │ payload  │◀──│Assembler │◀── pieces from Transport    │
//! │  │ (bytes)  │   │ (length) │                             │
//! │  └──────────┘   └──────────┘                             │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod checksum;
pub mod chunked;
pub mod codec;
pub mod transport;

pub use checksum::{Checksum, SumChecksum};
pub use codec::Request;
pub use transport::{Link, LinkSettings, Transport};
