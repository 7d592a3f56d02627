//! Operation Classifier
//!
//! Maps an operation id to create / delete / other for one resource family.
//! Known ids come from a static table; a naming heuristic covers ids added
//! to the platform after the table was written.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Create,
    Delete,
    Other,
}

/// How unknown operation ids are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyStrategy {
    /// Only ids listed in the family table
    Exact,
    /// Table first, naming heuristic for ids not in the table
    #[default]
    ExactThenHeuristic,
    /// Naming heuristic only
    Heuristic,
}

/// Operation ids and naming markers for one resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFamily {
    pub name: &'static str,
    pub create_ids: &'static [&'static str],
    pub delete_ids: &'static [&'static str],
    /// Substring identifying the family in an operation id
    pub contains: &'static str,
    /// Short suffix some platform-specific ids use instead
    pub suffix: &'static str,
}

pub const COMPUTE_ENV_FAMILY: ResourceFamily = ResourceFamily {
    name: "compute-env",
    create_ids: &["CreateComputeEnv"],
    delete_ids: &["DeleteComputeEnv"],
    contains: "ComputeEnv",
    suffix: "CE",
};

impl ResourceFamily {
    fn exact(&self, operation_id: &str) -> Option<OperationClass> {
        if self.create_ids.contains(&operation_id) {
            Some(OperationClass::Create)
        } else if self.delete_ids.contains(&operation_id) {
            Some(OperationClass::Delete)
        } else {
            None
        }
    }

    fn heuristic(&self, operation_id: &str) -> OperationClass {
        let in_family = operation_id.contains(self.contains) || operation_id.ends_with(self.suffix);
        if !in_family {
            return OperationClass::Other;
        }

        if operation_id.starts_with("Create") {
            OperationClass::Create
        } else if operation_id.starts_with("Delete") {
            OperationClass::Delete
        } else {
            OperationClass::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationClassifier {
    family: ResourceFamily,
    strategy: ClassifyStrategy,
}

impl OperationClassifier {
    pub fn new(family: ResourceFamily, strategy: ClassifyStrategy) -> Self {
        Self { family, strategy }
    }

    pub fn compute_envs(strategy: ClassifyStrategy) -> Self {
        Self::new(COMPUTE_ENV_FAMILY, strategy)
    }

    pub fn family(&self) -> &ResourceFamily {
        &self.family
    }

    pub fn strategy(&self) -> ClassifyStrategy {
        self.strategy
    }

    pub fn classify(&self, operation_id: &str) -> OperationClass {
        match self.strategy {
            ClassifyStrategy::Exact => {
                self.family.exact(operation_id).unwrap_or(OperationClass::Other)
            }
            ClassifyStrategy::Heuristic => self.family.heuristic(operation_id),
            ClassifyStrategy::ExactThenHeuristic => {
                if let Some(class) = self.family.exact(operation_id) {
                    return class;
                }
                let class = self.family.heuristic(operation_id);
                if class != OperationClass::Other {
                    tracing::warn!(
                        family = self.family.name,
                        operation = operation_id,
                        ?class,
                        "Operation id not in table, classified by name"
                    );
                }
                class
            }
        }
    }
}

impl Default for OperationClassifier {
    fn default() -> Self {
        Self::compute_envs(ClassifyStrategy::default())
    }
}
