//! User service client.

use crate::domain::error::BridgeResult;
use crate::facade::RpcBridge;
use serde::{Deserialize, Serialize};

pub const FIND_USER_BY_ID: &str = "find_user_by_id";
pub const FIND_USER_BY_EMPLOYEE_ID: &str = "find_user_by_employee_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Set when the account belongs to an employee
    #[serde(default)]
    pub employee_id: Option<String>,
}

#[derive(Serialize)]
struct UserRequest<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
struct EmployeeUserRequest<'a> {
    employee_id: &'a str,
}

#[derive(Deserialize)]
struct UserReply {
    user: User,
}

#[derive(Clone)]
pub struct UserClient {
    bridge: RpcBridge,
    queue: String,
}

impl UserClient {
    pub fn new(bridge: RpcBridge, queue: &str) -> Self {
        Self {
            bridge,
            queue: queue.to_string(),
        }
    }

    pub async fn find_by_id(&self, user_id: &str) -> BridgeResult<User> {
        let reply: UserReply = self
            .bridge
            .call_typed(&self.queue, FIND_USER_BY_ID, &UserRequest { user_id })
            .await?;
        Ok(reply.user)
    }

    /// The account linked to an employee.
    pub async fn find_by_employee_id(&self, employee_id: &str) -> BridgeResult<User> {
        let reply: UserReply = self
            .bridge
            .call_typed(
                &self.queue,
                FIND_USER_BY_EMPLOYEE_ID,
                &EmployeeUserRequest { employee_id },
            )
            .await?;
        Ok(reply.user)
    }
}
