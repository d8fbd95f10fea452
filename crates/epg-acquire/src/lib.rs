//! epg-acquire: schedule acquisition engine.
//!
//! Retrieves a multi-day programme schedule for many channels from a service
//! that caps both channels and time range per request, and that sometimes
//! answers a batched request with silently incomplete data.

pub mod cancel;
pub mod config;
pub mod coverage;
pub mod driver;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod transport;
pub mod types;

pub use cancel::Cancellation;
pub use config::AcquisitionConfig;
pub use coverage::{CoverageReport, CoverageValidator, CoverageVerdict};
pub use driver::{AcquisitionDriver, RunState, RunSummary};
pub use error::{AcquireError, AcquireResult, ConfigError, RequestError, TransportError};
pub use executor::RequestExecutor;
pub use fallback::{combine_channel_payloads, FallbackDecomposer};
pub use planner::{batch_channels, normalize_channel_ids, plan_windows, work_items, PlanSummary};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use storage::{read_combined, read_records, PersistenceWriter, RecordStream};
pub use transport::{HttpTransport, RawResponse, ScheduleQuery, Transport};
pub use types::*;
