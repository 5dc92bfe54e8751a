use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Display, Formatter},
};

use serde::{Deserialize, Serialize};

/// A deferred `@skip`/`@include` check: the selection is kept when the
/// variable evaluates to `passes_when`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predicate {
    pub variable: String,
    pub passes_when: bool,
}

impl Predicate {
    pub fn include_if(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            passes_when: true,
        }
    }

    pub fn skip_if(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            passes_when: false,
        }
    }

    pub fn evaluate(&self, variables: &HashMap<String, serde_json::Value>) -> bool {
        // A missing or non-boolean variable counts as `false`.
        let value = variables
            .get(&self.variable)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        value == self.passes_when
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.passes_when {
            write!(f, "${}", self.variable)
        } else {
            write!(f, "!${}", self.variable)
        }
    }
}

/// Inclusion condition in disjunctive normal form.
///
/// The selection is included when any conjunction holds. A condition with no
/// conjunction at all never holds. "Always included" is represented by the
/// absence of a condition (`Option::None`) wherever conditions are stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    any_of: Vec<BTreeSet<Predicate>>,
}

impl Condition {
    pub fn from_predicate(predicate: Predicate) -> Self {
        Self {
            any_of: vec![BTreeSet::from([predicate])],
        }
    }

    pub fn never() -> Self {
        Self { any_of: vec![] }
    }

    pub fn is_never(&self) -> bool {
        self.any_of.is_empty()
    }

    pub fn conjunctions(&self) -> &[BTreeSet<Predicate>] {
        &self.any_of
    }

    /// Both conditions must hold.
    pub fn and(left: Option<&Condition>, right: Option<&Condition>) -> Option<Condition> {
        match (left, right) {
            (None, None) => None,
            (Some(c), None) | (None, Some(c)) => Some(c.clone()),
            (Some(l), Some(r)) => {
                let mut any_of = Vec::with_capacity(l.any_of.len() * r.any_of.len());
                for lc in &l.any_of {
                    for rc in &r.any_of {
                        let merged: BTreeSet<Predicate> = lc.union(rc).cloned().collect();
                        if !is_contradictory(&merged) {
                            any_of.push(merged);
                        }
                    }
                }

                Some(Condition::from_conjunctions(any_of))
            }
        }
    }

    /// Either condition may hold. An unconditional side makes the result unconditional.
    pub fn or(left: Option<&Condition>, right: Option<&Condition>) -> Option<Condition> {
        match (left, right) {
            (Some(l), Some(r)) => {
                let any_of = l.any_of.iter().chain(r.any_of.iter()).cloned().collect();
                Some(Condition::from_conjunctions(any_of))
            }
            _ => None,
        }
    }

    fn from_conjunctions(mut any_of: Vec<BTreeSet<Predicate>>) -> Self {
        any_of.sort();
        any_of.dedup();

        Self { any_of }
    }

    pub fn evaluate(&self, variables: &HashMap<String, serde_json::Value>) -> bool {
        self.any_of
            .iter()
            .any(|conjunction| conjunction.iter().all(|p| p.evaluate(variables)))
    }

    pub fn variables(&self) -> BTreeSet<&str> {
        self.any_of
            .iter()
            .flatten()
            .map(|p| p.variable.as_str())
            .collect()
    }

    /// Splits the condition into at most one `@include` and one `@skip`
    /// variable, when it can be expressed that way in a subgraph document.
    pub fn as_directives(&self) -> Option<(Option<&str>, Option<&str>)> {
        let [conjunction] = self.any_of.as_slice() else {
            return None;
        };

        let mut include = None;
        let mut skip = None;
        for predicate in conjunction {
            let slot = if predicate.passes_when {
                &mut include
            } else {
                &mut skip
            };
            if slot.is_some() {
                return None;
            }
            *slot = Some(predicate.variable.as_str());
        }

        Some((include, skip))
    }
}

fn is_contradictory(conjunction: &BTreeSet<Predicate>) -> bool {
    conjunction.iter().any(|p| {
        conjunction.contains(&Predicate {
            variable: p.variable.clone(),
            passes_when: !p.passes_when,
        })
    })
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.any_of.is_empty() {
            return f.write_str("false");
        }

        for (i, conjunction) in self.any_of.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            for (j, predicate) in conjunction.iter().enumerate() {
                if j > 0 {
                    f.write_str(" && ")?;
                }
                write!(f, "{}", predicate)?;
            }
        }

        Ok(())
    }
}
