//! Bone hierarchy snapshot taken when a recording target is resolved

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ContractError;

/// Ordered bone names plus their parent table
///
/// `parent_indices[i] == -1` marks a root. The table is validated on
/// construction and stays immutable for the lifetime of one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub struct SkeletonDescriptor {
    bone_names: Vec<String>,
    parent_indices: Vec<i32>,
}

#[derive(Serialize, Deserialize)]
struct RawDescriptor {
    bone_names: Vec<String>,
    parent_indices: Vec<i32>,
}

impl TryFrom<RawDescriptor> for SkeletonDescriptor {
    type Error = ContractError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        Self::new(raw.bone_names, raw.parent_indices)
    }
}

impl From<SkeletonDescriptor> for RawDescriptor {
    fn from(desc: SkeletonDescriptor) -> Self {
        Self {
            bone_names: desc.bone_names,
            parent_indices: desc.parent_indices,
        }
    }
}

impl SkeletonDescriptor {
    /// Build and validate a descriptor
    ///
    /// # Errors
    /// - empty table or length mismatch
    /// - duplicate bone names
    /// - parent index outside `[-1, N)`
    /// - no root, or a parent chain that cycles
    pub fn new(bone_names: Vec<String>, parent_indices: Vec<i32>) -> Result<Self, ContractError> {
        let desc = Self {
            bone_names,
            parent_indices,
        };
        desc.validate()?;
        Ok(desc)
    }

    /// One-bone skeleton used for transform-only recordings
    pub fn single_bone(name: impl Into<String>) -> Self {
        Self {
            bone_names: vec![name.into()],
            parent_indices: vec![-1],
        }
    }

    fn validate(&self) -> Result<(), ContractError> {
        let n = self.bone_names.len();
        if n == 0 {
            return Err(ContractError::invalid_skeleton("skeleton has no bones"));
        }
        if self.parent_indices.len() != n {
            return Err(ContractError::invalid_skeleton(format!(
                "{} bone names but {} parent indices",
                n,
                self.parent_indices.len()
            )));
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &self.bone_names {
            if !seen.insert(name.as_str()) {
                return Err(ContractError::invalid_skeleton(format!(
                    "duplicate bone name '{name}'"
                )));
            }
        }

        for (i, &parent) in self.parent_indices.iter().enumerate() {
            if parent < -1 || parent >= n as i32 {
                return Err(ContractError::invalid_skeleton(format!(
                    "bone {i} ('{}') has parent {parent}, expected -1..{n}",
                    self.bone_names[i]
                )));
            }
        }

        if self.root_index().is_none() {
            return Err(ContractError::invalid_skeleton("skeleton has no root bone"));
        }

        // A chain longer than N steps can only mean a cycle.
        for start in 0..n {
            let mut cursor = self.parent(start);
            let mut steps = 0;
            while let Some(p) = cursor {
                steps += 1;
                if steps > n {
                    return Err(ContractError::invalid_skeleton(format!(
                        "parent chain of bone '{}' cycles",
                        self.bone_names[start]
                    )));
                }
                cursor = self.parent(p);
            }
        }

        Ok(())
    }

    pub fn bone_count(&self) -> usize {
        self.bone_names.len()
    }

    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    pub fn parent_indices(&self) -> &[i32] {
        &self.parent_indices
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bone_names.get(index).map(String::as_str)
    }

    /// Parent of `index`, `None` for roots and out-of-range indices
    pub fn parent(&self, index: usize) -> Option<usize> {
        match self.parent_indices.get(index) {
            Some(&p) if p >= 0 => Some(p as usize),
            _ => None,
        }
    }

    /// First bone with no parent
    pub fn root_index(&self) -> Option<usize> {
        self.parent_indices.iter().position(|&p| p == -1)
    }

    /// First bone (in table order) whose parent is `index`
    pub fn first_child(&self, index: usize) -> Option<usize> {
        self.parent_indices
            .iter()
            .position(|&p| p >= 0 && p as usize == index)
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.parent_indices
            .iter()
            .enumerate()
            .filter(move |(_, &p)| p >= 0 && p as usize == index)
            .map(|(i, _)| i)
    }
}
