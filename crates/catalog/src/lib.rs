pub mod catalog;
pub mod ordering;
pub mod periodic;
pub mod record;
pub mod service;
pub mod sync;

pub use catalog::*;
pub use ordering::*;
pub use periodic::*;
pub use record::*;
pub use service::*;
pub use sync::*;
