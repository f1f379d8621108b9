//! Routable addresses of storage cluster nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a node in the content cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Node storing bucket replicas
    Storage,
    /// Node distributing operations to storage nodes
    Distributor,
}

impl NodeType {
    /// Name used in routes
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Storage => "storage",
            NodeType::Distributor => "distributor",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "storage" => Ok(NodeType::Storage),
            "distributor" => Ok(NodeType::Distributor),
            other => Err(format!("unknown node type {:?}", other)),
        }
    }
}

/// Protocol prefix of every storage route
pub const ROUTE_SCHEME: &str = "storage";

/// Address of one node in a named cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageMessageAddress {
    cluster: String,
    node_type: NodeType,
    index: u16,
}

impl StorageMessageAddress {
    /// Address of node `index` of the given role in `cluster`
    pub fn new(cluster: impl Into<String>, node_type: NodeType, index: u16) -> Self {
        Self {
            cluster: cluster.into(),
            node_type,
            index,
        }
    }

    /// Cluster name
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Node role
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Node index
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Route string, e.g. `storage/cluster.foo/storage/3/default`
    pub fn route(&self) -> String {
        format!(
            "{}/cluster.{}/{}/{}/default",
            ROUTE_SCHEME, self.cluster, self.node_type, self.index
        )
    }
}

impl fmt::Display for StorageMessageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageMessageAddress(Storage protocol, cluster {}, nodetype {}, index {})",
            self.cluster, self.node_type, self.index
        )
    }
}
