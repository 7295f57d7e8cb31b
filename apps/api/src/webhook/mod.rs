// Webhook receiver for the messaging platform.

pub mod handlers;
pub mod relay;
