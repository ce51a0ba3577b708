use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SelectionError {
    #[error("Angular mask entry {index} must be 0 or 1 (value: {value})")]
    InvalidAngularFlag { index: usize, value: i64 },

    #[error("CV atom group {group} is empty")]
    EmptyGroup { group: usize },

    #[error("CV atom group {group} contains invalid atom id {id} (ids are 1-based)")]
    InvalidAtomId { group: usize, id: i64 },

    #[error("CV atom group {group} lists atom {id} more than once")]
    DuplicateAtom { group: usize, id: usize },

    #[error("Atom id {id} exceeds the {available} atoms present in the frame data")]
    AtomOutOfRange { id: usize, available: usize },
}

/// Per-dimension periodicity flags for a CV vector.
///
/// A `true` entry marks a dimension whose values live on `[-π, π)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AngularMask {
    flags: Vec<bool>,
}

impl AngularMask {
    pub fn new(flags: Vec<bool>) -> Self {
        Self { flags }
    }

    /// Builds a mask from the integer form used in CV configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::InvalidAngularFlag`] for any entry other than 0 or 1.
    pub fn from_flags(flags: &[i64]) -> Result<Self, SelectionError> {
        let flags = flags
            .iter()
            .enumerate()
            .map(|(index, &value)| match value {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(SelectionError::InvalidAngularFlag { index, value }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { flags })
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[inline]
    pub fn is_angular(&self, dim: usize) -> bool {
        self.flags.get(dim).copied().unwrap_or(false)
    }

    pub fn angular_dims(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(dim, &angular)| angular.then_some(dim))
    }
}

/// Ordered atom tuples, one per collective variable, using 1-based atom ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomGroups {
    groups: Vec<Vec<usize>>,
}

impl AtomGroups {
    /// Validates raw atom id tuples as read from configuration.
    ///
    /// Ids must be positive and unique within a tuple. The same atom may appear
    /// in several tuples.
    pub fn new(raw: &[Vec<i64>]) -> Result<Self, SelectionError> {
        let mut groups = Vec::with_capacity(raw.len());
        for (group, ids) in raw.iter().enumerate() {
            if ids.is_empty() {
                return Err(SelectionError::EmptyGroup { group });
            }
            let mut seen = HashSet::with_capacity(ids.len());
            let mut converted = Vec::with_capacity(ids.len());
            for &id in ids {
                if id < 1 {
                    return Err(SelectionError::InvalidAtomId { group, id });
                }
                let id = id as usize;
                if !seen.insert(id) {
                    return Err(SelectionError::DuplicateAtom { group, id });
                }
                converted.push(id);
            }
            groups.push(converted);
        }
        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Sorted, deduplicated 1-based ids of every atom referenced by any group.
    pub fn selected_atoms(&self) -> Vec<usize> {
        self.groups
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The groups rewritten as 0-based positions into [`Self::selected_atoms`].
    pub fn local_groups(&self) -> Vec<Vec<usize>> {
        let atoms = self.selected_atoms();
        self.groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .filter_map(|id| atoms.binary_search(id).ok())
                    .collect()
            })
            .collect()
    }

    /// Checks that every referenced atom exists in frames holding `available` atoms.
    pub fn check_within(&self, available: usize) -> Result<(), SelectionError> {
        match self.groups.iter().flatten().copied().max() {
            Some(id) if id > available => Err(SelectionError::AtomOutOfRange { id, available }),
            _ => Ok(()),
        }
    }
}
