use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted allocation state of one sliver. Absence of a row means the
/// sliver is unallocated; `Allocated -> Provisioned` is the only forward
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationState {
    #[serde(rename = "geni_allocated")]
    Allocated,
    #[serde(rename = "geni_provisioned")]
    Provisioned,
}

impl AllocationState {
    /// Wire name used in AM API `geni_allocation_status` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationState::Allocated => "geni_allocated",
            AllocationState::Provisioned => "geni_provisioned",
        }
    }
}

impl fmt::Display for AllocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geni_allocated" | "allocated" => Ok(AllocationState::Allocated),
            "geni_provisioned" | "provisioned" => Ok(AllocationState::Provisioned),
            other => Err(format!("unknown allocation state: {other}")),
        }
    }
}

/// One row of the allocation table, keyed by `sliver_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliverAllocation {
    /// Sliver URN.
    pub sliver_id: String,
    pub client_id: Option<String>,
    /// URN of the node the sliver runs on.
    pub component_id: String,
    pub slice_urn: String,
    pub allocation_state: AllocationState,
}

impl SliverAllocation {
    /// A freshly allocated row.
    pub fn allocated(
        sliver_id: impl Into<String>,
        client_id: Option<String>,
        component_id: impl Into<String>,
        slice_urn: impl Into<String>,
    ) -> Self {
        SliverAllocation {
            sliver_id: sliver_id.into(),
            client_id,
            component_id: component_id.into(),
            slice_urn: slice_urn.into(),
            allocation_state: AllocationState::Allocated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_use_geni_wire_names() {
        assert_eq!(AllocationState::Allocated.to_string(), "geni_allocated");
        assert_eq!(
            "provisioned".parse::<AllocationState>(),
            Ok(AllocationState::Provisioned)
        );
        assert!("geni_unallocated".parse::<AllocationState>().is_err());
        let json = serde_json::to_string(&AllocationState::Provisioned).unwrap();
        assert_eq!(json, "\"geni_provisioned\"");
    }
}
