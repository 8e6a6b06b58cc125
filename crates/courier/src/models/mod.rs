//! Domain models shared by both backends

mod email;
mod event;

pub use email::{Email, EmailAddress, ItemId};
pub use event::CalendarEvent;
