//! Domain model (ids, envelope, settings, policies, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod policy;
pub(crate) mod secs;
pub mod settings;
pub mod state;

pub use self::envelope::TaskEnvelope;
pub use self::errors::{ConfigError, PutError, QueueError};
pub use self::ids::{Identifier, TaskId};
pub use self::policy::{bump_attempts, escalate_delay};
pub use self::settings::QueueSettings;
pub use self::state::TaskState;
