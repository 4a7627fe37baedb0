pub mod controller;
pub mod scene;
pub mod selector;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

pub use controller::*;
pub use scene::*;
pub use selector::*;
pub use services::*;
pub use state::*;
