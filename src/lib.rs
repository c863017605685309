pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod storage;
pub mod telemetry;

pub use application::{AppError, BusinessService, Reconciler};
pub use domain::*;
pub use storage::{Database, LedgerStore, OwnerRepository};
