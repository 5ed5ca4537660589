//! Location records, provider filtering and retrieval.

mod fetch;
mod record;
mod selection;
mod source;

pub use fetch::{
    decrypt_locations, fetch_latest_blobs, DecodedBatch, FetchedBlobs, LocationService,
    MAX_EMPTY_SKIP_ATTEMPTS,
};
pub use record::LocationRecord;
pub use selection::{is_accurate_provider, select_location, LocationFilter, MAX_CANDIDATES};
pub use source::LocationSource;
