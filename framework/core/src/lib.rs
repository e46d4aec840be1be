mod poll;
mod shutdown;

pub mod prelude {
    pub use crate::poll::{poll_until, PollSettings, WaitError};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle};
}
