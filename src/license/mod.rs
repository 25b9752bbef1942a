//! Client license records, the immutable snapshot, and the file loader.

mod loader;
mod record;
mod snapshot;

pub use loader::{load_snapshot, spawn_reload_task};
pub use record::{EndpointRule, LicenseFile, LicenseRecord, RateLimits};
pub use snapshot::{is_date_expired, ClientEntry, CompiledRule, LicenseSnapshot, SharedSnapshot};
