//! Client side of the payment flow: polls the status endpoint after an STK
//! push until the payment settles.

pub mod http_source;
pub mod poller;

pub use http_source::HttpStatusSource;
pub use poller::{
    PaymentStatusPoller, PollError, PollFailure, PollHandle, PollObserver, PollOutcome,
    PollProgress, PollerConfig, StatusSource,
};
