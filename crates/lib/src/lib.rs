//! linebridge core library: LINE webhook gateway, relay pipeline, chat-completion client,
//! and image text extraction, used by the `linebridge` binary.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod relay;
pub mod vision;
