#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod clock;
mod endpoint;
mod error;
pub mod metrics;
mod query;
mod store;
mod throttle;
mod transport;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::endpoint::{Endpoint, EndpointResponse};
pub use crate::error::{
    EndpointError, ExcessiveQueryError, QueryError, StoreError, ThrottleError, TransportError,
};
pub use crate::metrics::{AtomicQueryMetrics, NoopMetrics, QueryMetrics};
pub use crate::query::{
    DEFAULT_MEDIA_TYPES, QueryOptions, accept_header, normalize_query, trim_indentation,
};
pub use crate::store::{KeyValueStore, MemoryStore, StoreWrite, Watch};
pub use crate::throttle::{Throttle, ThrottleConfig};
pub use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
