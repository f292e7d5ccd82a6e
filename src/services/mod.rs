pub mod pipeline;
pub mod process;
pub mod record_store;
pub mod storage;
pub mod thumbnails;
