pub mod bbox;
pub mod classes;
pub mod config;
pub mod error;
pub mod id;
pub mod math;
pub mod record;
pub mod rows;
pub mod session;
pub mod slice;
pub mod tracking_map;
pub mod writer;

pub use classes::{ClassEntry, ClassRegistry, NewClass};
pub use config::ExportConfig;
pub use error::Error;
pub use id::{ClassId, TrackId};
pub use record::{BoundingBox, FieldUpdate, RawRecord, RecordOverrides, Scalar};
pub use session::{DrawnBoundingBox, EditKind, Editor, SessionState};
pub use slice::RecordSlice;
pub use tracking_map::{LoadReport, Reassignment, TrackingMap};
pub use writer::{DelimitedFileWriter, Snapshot, TrackWriter};
