//! Deployment plans
//!
//! A `DeploymentPlan` names the customer a deployment targets and carries
//! the parameter substitutions (source value → deployment value) applied
//! while connections and shortcuts are recreated in the target
//! environment.

use std::collections::BTreeMap;

use crate::error::{CaravanError, CaravanResult};

/// One named substitution: the value as it appears in the source
/// environment and the value the deployment should use instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentParameter {
    pub name: String,
    pub source_value: String,
    pub deployment_value: String,
}

/// Named parameters for one deployment run
///
/// Immutable after construction except for parameter registration.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    pub customer_name: String,
    parameters: BTreeMap<String, DeploymentParameter>,
}

impl DeploymentPlan {
    /// Web datasource root used by web connections
    pub const WEB_PATH: &'static str = "webPath";
    /// Data lake server location
    pub const STORAGE_SERVER: &'static str = "storageServer";
    /// Data lake container name
    pub const STORAGE_CONTAINER: &'static str = "storageContainer";
    /// Path within the data lake container
    pub const STORAGE_CONTAINER_PATH: &'static str = "storageContainerPath";

    pub fn new(customer_name: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Register a parameter. Names are unique within a plan.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        source_value: impl Into<String>,
        deployment_value: impl Into<String>,
    ) -> CaravanResult<()> {
        let name = name.into();
        if self.parameters.contains_key(&name) {
            return Err(CaravanError::DuplicateParameter { name });
        }
        self.parameters.insert(
            name.clone(),
            DeploymentParameter {
                name,
                source_value: source_value.into(),
                deployment_value: deployment_value.into(),
            },
        );
        Ok(())
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameter(&self, name: &str) -> CaravanResult<&DeploymentParameter> {
        self.parameters
            .get(name)
            .ok_or_else(|| CaravanError::MissingParameter {
                name: name.to_string(),
            })
    }

    /// Deployment value for `name`, or `None` when unregistered
    pub fn deployment_value(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .map(|p| p.deployment_value.as_str())
    }

    /// True when all three storage parameters are registered.
    /// Storage redirection is all-or-nothing: a partial set would splice
    /// source and target paths together.
    pub fn has_storage_parameters(&self) -> bool {
        self.has_parameter(Self::STORAGE_SERVER)
            && self.has_parameter(Self::STORAGE_CONTAINER)
            && self.has_parameter(Self::STORAGE_CONTAINER_PATH)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &DeploymentParameter> {
        self.parameters.values()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
