use bb8::{Pool, State};

use super::manager::DriverManager;
use crate::types::ConnectionRole;

/// The write pool plus, when replicas are configured, a separate read pool.
#[derive(Clone, Debug)]
pub(crate) struct Router {
    write: Pool<DriverManager>,
    read: Option<Pool<DriverManager>>,
}

impl Router {
    pub(crate) fn new(write: Pool<DriverManager>, read: Option<Pool<DriverManager>>) -> Self {
        Self { write, read }
    }

    pub(crate) fn is_replicated(&self) -> bool {
        self.read.is_some()
    }

    /// Reads go to the replica pool when there is one; everything else to the primary.
    pub(crate) fn route(&self, role: ConnectionRole) -> &Pool<DriverManager> {
        match (role, &self.read) {
            (ConnectionRole::Read, Some(read)) => read,
            _ => &self.write,
        }
    }

    /// Open sessions across both pools.
    pub(crate) fn connections(&self) -> u32 {
        let count = |state: State| state.connections;
        count(self.write.state()) + self.read.as_ref().map_or(0, |read| count(read.state()))
    }
}
