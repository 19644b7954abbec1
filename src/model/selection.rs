use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::VariantId;

/// The set of variants a voter currently intends to submit for one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeSet<VariantId>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection holding exactly one variant.
    pub fn only(variant_id: impl Into<VariantId>) -> Self {
        Self(BTreeSet::from([variant_id.into()]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.0.contains(variant_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantId> {
        self.0.iter()
    }

    /// A copy of this selection with `variant_id` added.
    pub fn with(&self, variant_id: impl Into<VariantId>) -> Self {
        let mut set = self.0.clone();
        set.insert(variant_id.into());
        Self(set)
    }

    /// A copy of this selection with `variant_id` removed.
    pub fn without(&self, variant_id: &str) -> Self {
        let mut set = self.0.clone();
        set.remove(variant_id);
        Self(set)
    }

    /// The chosen IDs, in the form the vote request carries them.
    pub fn to_choices(&self) -> Vec<VariantId> {
        self.0.iter().cloned().collect()
    }
}

impl<T: Into<VariantId>> FromIterator<T> for Selection {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
