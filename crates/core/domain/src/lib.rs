pub mod data;

pub use data::{FieldValue, RawMessage, Snapshot};
