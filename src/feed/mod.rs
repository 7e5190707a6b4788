mod fetcher;

pub use fetcher::{merge_feeds, parse_feed, FeedPoller, PollReport};
