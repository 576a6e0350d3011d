//! Organization service client: organizations and their locations.

use crate::domain::error::BridgeResult;
use crate::facade::RpcBridge;
use serde::{Deserialize, Serialize};

pub const FIND_ORGANIZATION_BY_ID: &str = "find_organization_by_id";
pub const FIND_ORGANIZATION_LOCATION_BY_ID: &str = "find_organization_location_by_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// A site belonging to an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
}

#[derive(Serialize)]
struct OrganizationRequest<'a> {
    organization_id: &'a str,
}

#[derive(Serialize)]
struct LocationRequest<'a> {
    organization_location_id: &'a str,
}

#[derive(Deserialize)]
struct OrganizationReply {
    organization: Organization,
}

#[derive(Deserialize)]
struct LocationReply {
    organization_location: OrganizationLocation,
}

#[derive(Clone)]
pub struct OrganizationClient {
    bridge: RpcBridge,
    queue: String,
}

impl OrganizationClient {
    pub fn new(bridge: RpcBridge, queue: &str) -> Self {
        Self {
            bridge,
            queue: queue.to_string(),
        }
    }

    pub async fn find_by_id(&self, organization_id: &str) -> BridgeResult<Organization> {
        let reply: OrganizationReply = self
            .bridge
            .call_typed(
                &self.queue,
                FIND_ORGANIZATION_BY_ID,
                &OrganizationRequest { organization_id },
            )
            .await?;
        Ok(reply.organization)
    }

    pub async fn find_location_by_id(
        &self,
        organization_location_id: &str,
    ) -> BridgeResult<OrganizationLocation> {
        let reply: LocationReply = self
            .bridge
            .call_typed(
                &self.queue,
                FIND_ORGANIZATION_LOCATION_BY_ID,
                &LocationRequest {
                    organization_location_id,
                },
            )
            .await?;
        Ok(reply.organization_location)
    }
}
