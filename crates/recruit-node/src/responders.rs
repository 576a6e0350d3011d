//! Loopback sibling services.
//!
//! Each responder consumes one request queue on the in-memory broker and
//! answers on the envelope's `reply_to` queue. Every request is answered
//! from its own task after a random delay, so replies come back out of order.

use anyhow::{Context, Result};
use rand::Rng;
use recruit_bridge::clients::employee::{FIND_EMPLOYEES_BY_IDS, FIND_EMPLOYEE_BY_ID};
use recruit_bridge::clients::grade::FIND_GRADE_BY_ID;
use recruit_bridge::clients::job::FIND_JOB_BY_ID;
use recruit_bridge::clients::mail::SEND_MAIL;
use recruit_bridge::clients::organization::{
    FIND_ORGANIZATION_BY_ID, FIND_ORGANIZATION_LOCATION_BY_ID,
};
use recruit_bridge::clients::user::{FIND_USER_BY_EMPLOYEE_ID, FIND_USER_BY_ID};
use recruit_bridge::clients::{Employee, Grade, Job, Organization, OrganizationLocation, User};
use recruit_bridge::{MessageData, ServiceQueues, WireMessage};
use serde_json::{json, Value};
use shared_bus::{InMemoryBroker, QueuePublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Records the stand-in services answer from.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub employees: Vec<Employee>,
    pub organizations: Vec<Organization>,
    pub locations: Vec<OrganizationLocation>,
    pub jobs: Vec<Job>,
    pub users: Vec<User>,
    pub grades: Vec<Grade>,
}

impl Directory {
    /// A small fixed data set.
    pub fn sample() -> Self {
        Self {
            employees: vec![
                Employee {
                    id: "e-1".into(),
                    name: "Alice".into(),
                    email: Some("alice@example.com".into()),
                    organization_id: Some("o-1".into()),
                    job_id: Some("j-1".into()),
                },
                Employee {
                    id: "e-2".into(),
                    name: "Bob".into(),
                    email: None,
                    organization_id: Some("o-1".into()),
                    job_id: None,
                },
            ],
            organizations: vec![Organization {
                id: "o-1".into(),
                name: "Julong Group".into(),
            }],
            locations: vec![OrganizationLocation {
                id: "l-1".into(),
                name: "Jakarta Head Office".into(),
                organization_id: Some("o-1".into()),
            }],
            jobs: vec![Job {
                id: "j-1".into(),
                name: "Software Engineer".into(),
                organization_structure_id: None,
            }],
            users: vec![User {
                id: "u-1".into(),
                name: "Alice".into(),
                email: "alice@example.com".into(),
                employee_id: Some("e-1".into()),
            }],
            grades: vec![Grade {
                id: "g-1".into(),
                name: "G5".into(),
                job_level_id: None,
            }],
        }
    }

    /// Build the reply `message_data` for one request.
    pub fn answer(&self, message_type: &str, data: &MessageData) -> Value {
        let arg = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or_default();

        match message_type {
            FIND_EMPLOYEE_BY_ID => {
                keyed("employee", self.employees.iter().find(|e| e.id == arg("employee_id")))
            }
            FIND_EMPLOYEES_BY_IDS => {
                let wanted: Vec<&str> = data
                    .get("employee_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let found: Vec<&Employee> = self
                    .employees
                    .iter()
                    .filter(|e| wanted.contains(&e.id.as_str()))
                    .collect();
                json!({ "employees": found })
            }
            FIND_ORGANIZATION_BY_ID => keyed(
                "organization",
                self.organizations.iter().find(|o| o.id == arg("organization_id")),
            ),
            FIND_ORGANIZATION_LOCATION_BY_ID => keyed(
                "organization_location",
                self.locations
                    .iter()
                    .find(|l| l.id == arg("organization_location_id")),
            ),
            FIND_JOB_BY_ID => keyed("job", self.jobs.iter().find(|j| j.id == arg("job_id"))),
            FIND_USER_BY_ID => keyed("user", self.users.iter().find(|u| u.id == arg("user_id"))),
            FIND_USER_BY_EMPLOYEE_ID => keyed(
                "user",
                self.users
                    .iter()
                    .find(|u| u.employee_id.as_deref() == Some(arg("employee_id"))),
            ),
            FIND_GRADE_BY_ID => keyed(
                "grade",
                self.grades.iter().find(|g| g.id == arg("grade_id")),
            ),
            SEND_MAIL => json!({ "message": "mail queued" }),
            other => json!({ "error": format!("unsupported message type {other}") }),
        }
    }
}

fn keyed<T: serde::Serialize>(key: &str, record: Option<&T>) -> Value {
    match record {
        Some(record) => json!({ key: record }),
        None => json!({ "error": format!("{key} not found") }),
    }
}

/// The set of running stand-in services.
pub struct LoopbackSiblings {
    tasks: Vec<JoinHandle<()>>,
}

impl LoopbackSiblings {
    /// Subscribe to every service queue and start answering.
    pub fn spawn(
        broker: Arc<InMemoryBroker>,
        queues: &ServiceQueues,
        directory: Arc<Directory>,
        max_latency: Duration,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let names = [
            &queues.employee,
            &queues.organization,
            &queues.job,
            &queues.user,
            &queues.grade,
            &queues.mail,
        ];

        let mut tasks = Vec::with_capacity(names.len());
        for queue in names {
            tasks.push(spawn_responder(
                Arc::clone(&broker),
                queue,
                Arc::clone(&directory),
                max_latency,
                shutdown.clone(),
            )?);
        }

        info!(count = tasks.len(), "Loopback sibling services started");
        Ok(Self { tasks })
    }

    /// Wait for every responder to stop.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Responder task ended abnormally");
            }
        }
    }
}

fn spawn_responder(
    broker: Arc<InMemoryBroker>,
    queue: &str,
    directory: Arc<Directory>,
    max_latency: Duration,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    let mut requests = broker
        .subscribe(queue)
        .with_context(|| format!("Failed to consume {queue}"))?;

    Ok(tokio::spawn(async move {
        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = requests.recv() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let request = match WireMessage::decode(delivery.body()) {
                Ok(request) => request,
                Err(e) => {
                    warn!(queue = %delivery.queue, error = %e, "Undecodable request");
                    continue;
                }
            };
            let Some(reply_to) = request.reply_to.clone() else {
                warn!(queue = %delivery.queue, id = %request.id, "Request without reply_to");
                continue;
            };

            let broker = Arc::clone(&broker);
            let directory = Arc::clone(&directory);
            tokio::spawn(async move {
                let delay = random_delay(max_latency);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply(&broker, &directory, request, &reply_to).await;
            });
        }
        debug!(queue = %requests.queue(), "Responder stopped");
    }))
}

async fn reply(
    broker: &InMemoryBroker,
    directory: &Directory,
    request: WireMessage,
    reply_to: &str,
) {
    let message_data = match directory.answer(&request.message_type, &request.message_data) {
        Value::Object(map) => map,
        _ => MessageData::new(),
    };
    let reply = WireMessage {
        id: request.id,
        message_type: request.message_type,
        message_data,
        reply_to: None,
    };

    let body = match reply.encode() {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to encode reply");
            return;
        }
    };
    if let Err(e) = broker.publish(reply_to, body).await {
        warn!(queue = reply_to, error = %e, "Failed to publish reply");
    }
}

fn random_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
