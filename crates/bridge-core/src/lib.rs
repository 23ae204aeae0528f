pub mod clock;
pub mod cycle_log;
pub mod error;
pub mod measurement;
pub mod registers;
pub mod tags;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cycle_log::{object_name, CycleLog, FinishedLog};
pub use error::{CycleError, DecodeError};
pub use measurement::{build_measurement, Envelope, Measurement, MessageBuilder};
pub use registers::{decode_float_block, logical_address, RawReading};
pub use tags::{TagMap, TagMapping};
