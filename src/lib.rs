pub mod core;

pub use crate::core::news::{NewsConfig, NewsRunReport};
pub use crate::core::podcast::{PodcastConfig, PodcastRunReport};
pub use crate::core::sources::FeedSpec;
