//! botrelay core library — config, channels, dispatcher, and the webhook
//! HTTP server used by the CLI.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod init;
pub mod server;
