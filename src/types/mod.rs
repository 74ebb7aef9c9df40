//! Plain data types shared by receivers, the poll cycle executor and output contracts.

use std::collections::HashMap;

mod cycle_result;
mod cycle_status;
mod partial_output_policy;
mod payload;
mod received_event;
mod receiver_config;
mod receiver_state;

pub use cycle_result::CycleResult;
pub use cycle_status::CycleStatus;
pub use partial_output_policy::PartialOutputPolicy;
pub use payload::Payload;
pub use received_event::ReceivedEvent;
pub use receiver_config::{Credentials, DEFAULT_STOP_GRACE_MS, ReceiverConfig, ValidatedConfig};
pub use receiver_state::ReceiverState;

/// Per-payload metadata. Keys are unique; ordering carries no meaning.
pub type Metadata = HashMap<String, String>;
