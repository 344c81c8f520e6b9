pub mod payflow;

pub use payflow::{PayflowConfig, PayflowGateway};
