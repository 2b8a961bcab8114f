//! Column-oriented result frames and the schema-keyed merge used to stitch
//! paginated query results back together.
//!
//! A [`Frame`] is an ordered list of equally long [`Field`]s. Two frames are
//! considered the same logical series when their [`SchemaKey`]s are equal;
//! [`merge_frames`] appends the rows of matching frames and keeps everything
//! else in first-seen order.

mod frame;
mod merge;
mod schema_key;

pub use frame::{Field, FieldType, Frame, FrameError, FrameMeta, Labels};
pub use merge::{merge_frames, total_rows};
pub use schema_key::{ColumnKey, SchemaKey};
