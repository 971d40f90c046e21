pub mod channel;
pub mod record;

pub use channel::{Channel, UnknownChannel};
pub use record::{DetectionRecord, RawDetection};
