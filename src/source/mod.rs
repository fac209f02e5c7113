mod client;
mod feed;
mod http;
mod reader;

pub use client::SourceSession;
pub use feed::{parse_page, ChangeFeed, FeedPage, FieldValue, RawEntry, ResourceKind, TargetRef};
pub use http::check_response;
pub use reader::ChangeFeedReader;
