//! Scanner input detection
//!
//! ```text
//! key events ──► ScanParser ──(fast run + terminator)──► token
//!                    ▲
//!                ScanGate (closed while a text-entry surface is open)
//! ```

mod gate;
mod parser;

pub use gate::{ScanGate, SuppressGuard};
pub use parser::{Charset, ScanConfig, ScanParser};
