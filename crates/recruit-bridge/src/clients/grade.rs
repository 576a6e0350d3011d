//! Grade service client.

use crate::domain::error::BridgeResult;
use crate::facade::RpcBridge;
use serde::{Deserialize, Serialize};

pub const FIND_GRADE_BY_ID: &str = "find_grade_by_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub job_level_id: Option<String>,
}

#[derive(Serialize)]
struct GradeRequest<'a> {
    grade_id: &'a str,
}

#[derive(Deserialize)]
struct GradeReply {
    grade: Grade,
}

#[derive(Clone)]
pub struct GradeClient {
    bridge: RpcBridge,
    queue: String,
}

impl GradeClient {
    pub fn new(bridge: RpcBridge, queue: &str) -> Self {
        Self {
            bridge,
            queue: queue.to_string(),
        }
    }

    pub async fn find_by_id(&self, grade_id: &str) -> BridgeResult<Grade> {
        let reply: GradeReply = self
            .bridge
            .call_typed(&self.queue, FIND_GRADE_BY_ID, &GradeRequest { grade_id })
            .await?;
        Ok(reply.grade)
    }
}
