//! Employee service client.

use crate::domain::error::BridgeResult;
use crate::facade::RpcBridge;
use serde::{Deserialize, Serialize};

pub const FIND_EMPLOYEE_BY_ID: &str = "find_employee_by_id";
pub const FIND_EMPLOYEES_BY_IDS: &str = "find_employees_by_ids";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Serialize)]
struct ByIdRequest<'a> {
    employee_id: &'a str,
}

#[derive(Serialize)]
struct ByIdsRequest<'a> {
    employee_ids: &'a [String],
}

#[derive(Deserialize)]
struct EmployeeReply {
    employee: Employee,
}

#[derive(Deserialize)]
struct EmployeesReply {
    #[serde(default)]
    employees: Vec<Employee>,
}

#[derive(Clone)]
pub struct EmployeeClient {
    bridge: RpcBridge,
    queue: String,
}

impl EmployeeClient {
    pub fn new(bridge: RpcBridge, queue: &str) -> Self {
        Self {
            bridge,
            queue: queue.to_string(),
        }
    }

    pub async fn find_by_id(&self, employee_id: &str) -> BridgeResult<Employee> {
        let reply: EmployeeReply = self
            .bridge
            .call_typed(&self.queue, FIND_EMPLOYEE_BY_ID, &ByIdRequest { employee_id })
            .await?;
        Ok(reply.employee)
    }

    /// Batch lookup. Unknown IDs are simply absent from the result.
    pub async fn find_by_ids(&self, employee_ids: &[String]) -> BridgeResult<Vec<Employee>> {
        if employee_ids.is_empty() {
            return Ok(Vec::new());
        }
        let reply: EmployeesReply = self
            .bridge
            .call_typed(&self.queue, FIND_EMPLOYEES_BY_IDS, &ByIdsRequest { employee_ids })
            .await?;
        Ok(reply.employees)
    }
}
