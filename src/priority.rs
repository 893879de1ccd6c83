use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Caller-supplied collision priorities.
///
/// Deserializes from either a list (every listed module scores 1) or a
/// table of integer scores. Unlisted modules score 0.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Priorities {
    Listed(BTreeSet<String>),
    Scored(BTreeMap<String, i64>),
}

impl Default for Priorities {
    fn default() -> Self {
        Priorities::Scored(BTreeMap::new())
    }
}

impl Priorities {
    pub fn listed<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Priorities::Listed(modules.into_iter().map(Into::into).collect())
    }

    pub fn scored<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Priorities::Scored(scores.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn score(&self, module: &str) -> i64 {
        match self {
            Priorities::Listed(set) => i64::from(set.contains(module)),
            Priorities::Scored(map) => map.get(module).copied().unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Priorities::Listed(set) => set.is_empty(),
            Priorities::Scored(map) => map.is_empty(),
        }
    }
}

/// Modules in fold order: ascending `(score, id)`.
///
/// Later modules overwrite earlier ones, so the highest score wins and a
/// tie goes to the identifier that sorts greater.
pub fn fold_order<I, S>(modules: I, priorities: &Priorities) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let ready: BTreeSet<(i64, String)> = modules
        .into_iter()
        .map(Into::into)
        .map(|id| (priorities.score(&id), id))
        .collect();

    ready.into_iter().map(|(_, id)| id).collect()
}
