//! Typed integration clients for the sibling services.
//!
//! Each client owns its destination queue and message types and goes
//! through [`RpcBridge::call_typed`]. Replies wrap the entity under a named
//! key, e.g. `{"employee": {...}}`; a missing key is a decode error.

pub mod employee;
pub mod grade;
pub mod job;
pub mod mail;
pub mod organization;
pub mod user;

pub use employee::{Employee, EmployeeClient};
pub use grade::{Grade, GradeClient};
pub use job::{Job, JobClient};
pub use mail::{MailClient, MailMessage};
pub use organization::{Organization, OrganizationClient, OrganizationLocation};
pub use user::{User, UserClient};

use crate::domain::config::ServiceQueues;
use crate::facade::RpcBridge;

/// One client per sibling service, all sharing one bridge.
#[derive(Clone)]
pub struct ServiceClients {
    pub employee: EmployeeClient,
    pub organization: OrganizationClient,
    pub job: JobClient,
    pub user: UserClient,
    pub grade: GradeClient,
    pub mail: MailClient,
}

impl ServiceClients {
    pub fn new(bridge: RpcBridge, queues: &ServiceQueues) -> Self {
        Self {
            employee: EmployeeClient::new(bridge.clone(), &queues.employee),
            organization: OrganizationClient::new(bridge.clone(), &queues.organization),
            job: JobClient::new(bridge.clone(), &queues.job),
            user: UserClient::new(bridge.clone(), &queues.user),
            grade: GradeClient::new(bridge.clone(), &queues.grade),
            mail: MailClient::new(bridge, &queues.mail),
        }
    }
}
