//! Stage labels and the version-to-stage map of a secret.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};
use crate::id::{SecretId, VersionId};

/// A label attached to a secret version.
///
/// Each label is held by at most one version of a secret at a time; the
/// secret store enforces that when labels are moved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageLabel {
    /// The version clients should use (`AWSCURRENT`)
    Current,
    /// The version being rotated in (`AWSPENDING`)
    Pending,
    /// The version that was current before the last promotion (`AWSPREVIOUS`)
    Previous,
    /// Any label not managed by rotation
    Custom(String),
}

impl StageLabel {
    /// Wire name understood by the secret store
    pub fn as_str(&self) -> &str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Pending => "AWSPENDING",
            Self::Previous => "AWSPREVIOUS",
            Self::Custom(label) => label,
        }
    }
}

impl From<&str> for StageLabel {
    fn from(label: &str) -> Self {
        match label {
            "AWSCURRENT" => Self::Current,
            "AWSPENDING" => Self::Pending,
            "AWSPREVIOUS" => Self::Previous,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for StageLabel {
    fn from(label: String) -> Self {
        match label.as_str() {
            "AWSCURRENT" | "AWSPENDING" | "AWSPREVIOUS" => Self::from(label.as_str()),
            _ => Self::Custom(label),
        }
    }
}

impl From<StageLabel> for String {
    fn from(label: StageLabel) -> Self {
        match label {
            StageLabel::Custom(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping of every live version of a secret to its stage labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStages(BTreeMap<VersionId, BTreeSet<StageLabel>>);

impl VersionStages {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `labels` to `version`, merging with labels already recorded
    pub fn insert(
        &mut self,
        version: VersionId,
        labels: impl IntoIterator<Item = StageLabel>,
    ) -> &mut Self {
        self.0.entry(version).or_default().extend(labels);
        self
    }

    /// Labels held by `version`, if the version exists
    pub fn labels(&self, version: &VersionId) -> Option<&BTreeSet<StageLabel>> {
        self.0.get(version)
    }

    /// Whether `version` exists and holds `stage`
    pub fn holds(&self, version: &VersionId, stage: &StageLabel) -> bool {
        self.0
            .get(version)
            .is_some_and(|labels| labels.contains(stage))
    }

    /// Every version holding `stage`
    pub fn versions_with(&self, stage: &StageLabel) -> Vec<&VersionId> {
        self.0
            .iter()
            .filter(|(_, labels)| labels.contains(stage))
            .map(|(version, _)| version)
            .collect()
    }

    /// The single version labelled CURRENT.
    ///
    /// A secret under rotation must have exactly one; anything else means the
    /// store is not in a state the step handlers can reason about.
    pub fn current_version(&self, secret_id: &SecretId) -> RotationResult<VersionId> {
        match self.versions_with(&StageLabel::Current).as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(RotationError::NoCurrentVersion {
                secret_id: secret_id.clone(),
            }),
            many => Err(RotationError::AmbiguousCurrentVersion {
                secret_id: secret_id.clone(),
                versions: many.iter().map(|v| (*v).clone()).collect(),
            }),
        }
    }

    /// Number of versions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no versions are recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over versions and their labels
    pub fn iter(&self) -> impl Iterator<Item = (&VersionId, &BTreeSet<StageLabel>)> {
        self.0.iter()
    }
}

impl FromIterator<(VersionId, BTreeSet<StageLabel>)> for VersionStages {
    fn from_iter<T: IntoIterator<Item = (VersionId, BTreeSet<StageLabel>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
