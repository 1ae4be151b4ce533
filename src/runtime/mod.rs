pub mod channel;
pub mod context;
pub mod engine;
pub mod observer;
pub mod sheets;
pub mod storage;
pub mod transcript;
