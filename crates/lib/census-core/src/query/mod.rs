//! Request shaping between tool parameters and the Census source.
//!
//! Value filters are opaque to this layer, column lists are normalized, and
//! row/cell/gene limits are validated and pushed down to the source.

pub mod columns;
pub mod filter;
pub mod limits;
pub mod request;

pub use columns::ColumnSelection;
pub use filter::ValueFilter;
pub use limits::{QueryLimits, RowLimit};
pub use request::{
    CellTypeInput,
    CellTypeRequest,
    MetadataInput,
    QueryRequest,
    SliceInput,
    SliceRequest,
};
