pub mod clock;
pub mod delivery;
pub mod manual;
pub mod scheduler;
pub mod timer;

pub use clock::{Clock, SystemClock, TokioClock};
pub use delivery::DeliveryState;
pub use manual::ManualClock;
pub use scheduler::{DeliveryFailure, PlaybackHandle, PlaybackScheduler};
pub use timer::{TimerFacility, TimerGuard, TimerTask, TokioTimer};
