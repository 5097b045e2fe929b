pub mod debounce;
pub mod event;

pub use debounce::RestoreDebouncer;
pub use event::{EventReaction, HostEvent};
