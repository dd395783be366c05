// ── Domain model ──
//
// Value types shared by the pools, the product state machine and the
// command layer. All of them validate on construction.

mod address;
mod antenna;
mod streams;
mod target;
mod worker;

pub use address::AddressRange;
pub use antenna::{Antenna, format_antenna_csv, parse_antenna_csv};
pub use streams::StreamDescriptors;
pub use target::{Coordinates, Target};
pub use worker::WorkerEndpoint;
