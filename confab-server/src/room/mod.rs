mod command;
mod participant;
mod registry;
mod room;

pub use command::*;
pub use participant::*;
pub use registry::*;
pub use room::*;
