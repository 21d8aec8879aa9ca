pub mod log_event;
pub mod transaction;
pub mod classification;
pub mod notification;

pub use log_event::LogEvent;
pub use transaction::{ParsedInstruction, TransactionDetail};
pub use classification::{ClassificationResult, Tier, TokenMetadata, TokenProfile};
pub use notification::{ChannelDestination, DeliveryOutcome, DispatchReport, Notification};
