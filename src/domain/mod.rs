//! Domain layer: the flat records the bridge persists and routes.

pub mod booking;
pub mod business;
pub mod conversation;

pub use booking::{Booking, BookingStatus};
pub use business::Business;
pub use conversation::{Conversation, Platform};
