pub mod fold;
pub mod session;
pub mod state;

pub use fold::StateFold;
pub use session::PlaybackSession;
pub use state::{DuplicatePolicy, RevealedState};
