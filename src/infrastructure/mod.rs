pub mod cache;
pub mod config;
pub mod crypto;
pub mod events;
pub mod llm;
pub mod mailer;
pub mod postgres_billing_repo;
pub mod rate_limit;
pub mod razorpay;
pub mod repository;

pub use cache::*;
pub use config::*;
pub use crypto::*;
pub use events::*;
pub use llm::*;
pub use mailer::*;
pub use postgres_billing_repo::*;
pub use rate_limit::*;
pub use razorpay::*;
pub use repository::*;
