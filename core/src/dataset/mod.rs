pub mod event_dataset;
pub mod loader;

pub use event_dataset::EventDataset;
