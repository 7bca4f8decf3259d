//! Canonical ordering of production stages.

use crate::domain::errors::ConfigError;
use std::collections::HashSet;

/// Ordered list of stage names. Earlier entries are earlier on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSequence {
    stages: Vec<String>,
}

impl StageSequence {
    pub fn new<I, S>(stages: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stages: Vec<String> = stages.into_iter().map(Into::into).collect();
        if stages.is_empty() {
            return Err(ConfigError::EmptyStageSequence);
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.as_str()) {
                return Err(ConfigError::DuplicateStage(stage.clone()));
            }
        }

        Ok(Self { stages })
    }

    /// Position of `stage` on the line, or `None` if it is not part of it.
    pub fn rank(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.rank(stage).is_some()
    }

    /// The stage with the greatest rank among `stages`, ignoring stages that
    /// are not part of the sequence.
    pub fn furthest<'a, I>(&self, stages: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        stages
            .into_iter()
            .filter_map(|s| self.rank(s).map(|rank| (rank, s)))
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, s)| s)
    }

    /// Current stage of an order: the furthest ranked stage it has been
    /// scanned at, or `fallback` when none of its stages are ranked.
    pub fn current_stage<'a, I>(&self, stages: I, fallback: &'a str) -> &'a str
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.furthest(stages).unwrap_or(fallback)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
