//! Supervisor domain: restart policy, start planning, and health reports.

mod error;
mod health;
mod plan;
mod report;
mod restart;

pub use error::{SupervisorError, SupervisorResult};
pub use health::HealthReport;
pub use plan::{PlanIssue, StartPlan};
pub use report::{StartReport, StopReport};
pub use restart::{RestartDecision, RestartPolicy};
