//! Running the operations attached to result items

mod handler;

pub use handler::{ActionError, ActionHandler, Launcher, SystemLauncher};
