//! service configuration

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::group::{GroupParameters, ParameterSet, DEFAULT_GENERATOR_LABEL};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// modulus backing commitments and proofs
    pub parameter_set: ParameterSet,
    /// label hashed into the exponent of `h`
    pub generator_label: String,
    /// `cosign` without a participant signs for both sides
    pub cosign_both_by_default: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            parameter_set: ParameterSet::default(),
            generator_label: DEFAULT_GENERATOR_LABEL.to_string(),
            cosign_both_by_default: true,
        }
    }
}

impl ChannelConfig {
    pub fn with_parameter_set(mut self, set: ParameterSet) -> Self {
        self.parameter_set = set;
        self
    }

    pub fn with_generator_label(mut self, label: impl Into<String>) -> Self {
        self.generator_label = label.into();
        self
    }

    pub fn with_cosign_both(mut self, enabled: bool) -> Self {
        self.cosign_both_by_default = enabled;
        self
    }

    /// group for this config, the shared default when nothing is overridden
    pub fn group_parameters(&self) -> Arc<GroupParameters> {
        if self.parameter_set == ParameterSet::Modp2048
            && self.generator_label == DEFAULT_GENERATOR_LABEL
        {
            GroupParameters::shared()
        } else {
            Arc::new(GroupParameters::new(
                self.parameter_set,
                self.generator_label.as_bytes(),
            ))
        }
    }
}
