//! Ports over the durable ledger store.

mod accounting;
mod deployments;
mod logs;
mod projects;

pub use accounting::{AccountingRepository, LedgerQuery};
pub use deployments::DeploymentRepository;
pub use logs::{LogQuery, LogRepository};
pub use projects::ProjectRepository;
