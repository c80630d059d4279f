//! Distributor inventory feed: retrieval and parsing

pub mod ftp;
pub mod parser;

pub use ftp::{FeedFetcher, FeedSource, LocalFeed};
pub use parser::{parse_feed, parse_feed_file, Feed, FeedRecord};
