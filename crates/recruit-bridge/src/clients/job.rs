//! Job service client.

use crate::domain::error::BridgeResult;
use crate::facade::RpcBridge;
use serde::{Deserialize, Serialize};

pub const FIND_JOB_BY_ID: &str = "find_job_by_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_structure_id: Option<String>,
}

#[derive(Serialize)]
struct JobRequest<'a> {
    job_id: &'a str,
}

#[derive(Deserialize)]
struct JobReply {
    job: Job,
}

#[derive(Clone)]
pub struct JobClient {
    bridge: RpcBridge,
    queue: String,
}

impl JobClient {
    pub fn new(bridge: RpcBridge, queue: &str) -> Self {
        Self {
            bridge,
            queue: queue.to_string(),
        }
    }

    pub async fn find_by_id(&self, job_id: &str) -> BridgeResult<Job> {
        let reply: JobReply = self
            .bridge
            .call_typed(&self.queue, FIND_JOB_BY_ID, &JobRequest { job_id })
            .await?;
        Ok(reply.job)
    }
}
