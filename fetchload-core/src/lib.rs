pub mod data;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod schema;
pub mod transform;

pub use data::{RunMeta, RunSummary, Store, WriteMode};
pub use error::{LoadError, Stage, StorageError};
pub use pipeline::{LoadOptions, LoadProgressCallback, execute_load, run};
pub use record::{Record, decode_records};
pub use report::RunReport;
