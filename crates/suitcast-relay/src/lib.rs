pub mod config;
pub mod feed;
pub mod logging;
pub mod outbox;
pub mod parser;
pub mod relay;
pub mod simulate;
pub mod store;
