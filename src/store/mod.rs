mod swift;
mod types;

pub use swift::SwiftStore;
pub use types::{
    collect_headers, headers, http_date_to_iso8601, Headers, ObjectStat, ObjectStore, UploadAction,
    UploadEvent, UploadObject,
};
