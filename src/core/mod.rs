pub mod animator;
pub mod catalog;
pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod initiator;
pub mod lifecycle;
pub mod message;
pub mod request;
pub mod sse;
pub mod turn;
