pub mod feed;
pub mod llm;
pub mod news;
pub mod podcast;
pub mod seen;
pub mod sources;
pub mod webhook;
