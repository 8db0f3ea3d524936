pub mod notifier;
pub mod store;

pub use notifier::*;
pub use store::*;
