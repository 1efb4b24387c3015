pub mod agents;
pub mod auth;
pub mod payments;

pub use agents::*;
pub use auth::*;
pub use payments::*;
