pub mod event_bus;
pub mod job;
pub mod lane;
pub mod liveness;
pub mod work_queue;

pub use event_bus::*;
pub use job::*;
pub use lane::*;
pub use liveness::*;
pub use work_queue::*;
