// ABOUTME: Deployment target identity - organization, space, and API endpoint.
// ABOUTME: Equality of all three fields defines "the same infrastructure".

use serde::{Deserialize, Serialize};
use std::fmt;

/// The organization/space/endpoint triple a phase deploys into.
///
/// Two phases of the same logical service must agree on the full triple;
/// the sweeping-output bridge rejects lookups across mismatched targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpace {
    pub organization: String,
    pub space: String,
    pub endpoint: String,
}

impl TargetSpace {
    pub fn new(
        organization: impl Into<String>,
        space: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            space: space.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for TargetSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} @ {}",
            self.organization, self.space, self.endpoint
        )
    }
}
