pub mod client;
pub mod config;
pub mod error;
pub mod strategy;
mod worker;

pub use client::{AggregatorClient, CoordinatorClient, PushOutcome, Registration, SyncProbe};
pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use strategy::{ConstGradient, GradientStrategy};
pub use worker::Worker;
