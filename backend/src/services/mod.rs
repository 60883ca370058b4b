pub mod access;
pub mod accounts;
pub mod catalog;
pub mod payment;
pub mod promo;
pub mod reports;
pub mod scheduler;
pub mod subscription;

pub use access::{AccessStatus, StudentAccess};
pub use payment::{PaymentService, WebhookOutcome};
pub use scheduler::{ExpiryScheduler, SweepStats};
pub use subscription::{SubscriptionState, SubscriptionStatus};
