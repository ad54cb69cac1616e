pub mod error;
pub mod warnings;
pub mod model;
pub mod vocabulary;
pub mod split;
pub mod normalize;
pub mod gps_fusion;
pub mod dive_state;
pub mod depth;
pub mod sensors;
pub mod attributes;
pub mod pipeline;
pub mod archive;

pub use error::{PipelineError, Result};
pub use model::{DiveRecord, MeasurementStream, RawField};
pub use pipeline::{process_dive, process_mission, MissionDataset, ProcessedDive};
