//! Sealed group instances.

use std::sync::Arc;

use crate::model::EngineObject;
use crate::rules::Group;

/// One sealed cluster of a group: its members and the synthetic object
/// built from them.
#[derive(Debug)]
pub struct SogInstance {
    key: String,
    members: Vec<Arc<EngineObject>>,
    object: Arc<EngineObject>,
    group: Arc<Group>,
}

impl SogInstance {
    pub(crate) fn new(
        key: String,
        members: Vec<Arc<EngineObject>>,
        object: Arc<EngineObject>,
        group: Arc<Group>,
    ) -> Self {
        Self {
            key,
            members,
            object,
            group,
        }
    }

    /// Identifier derived from the shared values, unique within the builder.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn members(&self) -> &[Arc<EngineObject>] {
        &self.members
    }

    pub fn object(&self) -> &Arc<EngineObject> {
        &self.object
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }
}
