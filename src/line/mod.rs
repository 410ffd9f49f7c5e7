//! LINE Messaging API plumbing: callback signature checks, webhook event
//! decoding, reply message assembly and the reply client.

pub mod client;
pub mod events;
pub mod messages;
pub mod signature;

pub use client::{LineClient, ReplySender};
pub use events::{Event, PostbackEvent, ReplyToken, TextMessageEvent, decode};
pub use messages::{
    Action, Column, PickerMode, ReplyPayload, build_carousel, build_confirm, build_text,
};
pub use signature::{SIGNATURE_HEADER, VerifiedPayload, verify};
