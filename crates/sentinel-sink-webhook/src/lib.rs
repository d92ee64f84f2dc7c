pub mod admin;
pub mod card;
pub mod client;
pub mod error;

pub use admin::{AdminEvent, AdminNotifier};
pub use card::{build_card, Fact, WebhookCard};
pub use client::{Severity, WebhookClient};
pub use error::{Result, WebhookError};
