//! Communication channels (Telegram, Viber, Instagram).
//!
//! Payload types and normalizers for each platform's webhook shape, plus the
//! sender trait and registry the dispatcher uses to route replies back out.

mod inbound;
mod instagram;
mod registry;
mod telegram;
mod viber;

pub use inbound::{InboundMessage, Platform};
pub use instagram::{normalize_envelope, InstagramChannel, InstagramEnvelope};
pub use registry::{ChannelRegistry, ChannelSender};
pub use telegram::{normalize_update, TelegramChannel, TelegramUpdate};
pub use viber::{normalize_callback, verify_signature, ViberCallback, ViberChannel};
