pub mod agent;
pub mod analytics;
pub mod billing;
pub mod snippet;
pub mod user;

pub use agent::*;
pub use analytics::*;
pub use billing::*;
pub use snippet::*;
pub use user::*;
