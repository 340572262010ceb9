//! Condition language - pure boolean expressions over the state store.
//!
//! Conditions are data, not code: they serialize, they can be inspected and
//! displayed to explain why a gate is closed, and evaluating one never
//! mutates anything. Unknown flag/counter/item references evaluate to a
//! deterministic default (absent flag = false, absent counter = 0) so
//! content can reference facts no prior content has set yet.

use serde::{Deserialize, Serialize};

use crate::store::StateStore;

/// Comparison operators for counter predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Compare {
    /// Apply the comparison to two values.
    pub fn test(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Compare::Eq => lhs == rhs,
            Compare::Ne => lhs != rhs,
            Compare::Lt => lhs < rhs,
            Compare::Le => lhs <= rhs,
            Compare::Gt => lhs > rhs,
            Compare::Ge => lhs >= rhs,
        }
    }
}

impl std::fmt::Display for Compare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Compare::Eq => "==",
            Compare::Ne => "!=",
            Compare::Lt => "<",
            Compare::Le => "<=",
            Compare::Gt => ">",
            Compare::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// A boolean expression over flags, counters, and inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Always true; the guard of an unguarded edge and the catch-all ending.
    Always,

    /// True when the flag has been set.
    Flag(String),

    /// True when the item/clue is in the inventory.
    Item(String),

    /// Compare a counter against a constant.
    Counter {
        name: String,
        op: Compare,
        value: f64,
    },

    /// All sub-conditions hold.
    All(Vec<Condition>),

    /// At least one sub-condition holds.
    Any(Vec<Condition>),

    /// The sub-condition does not hold.
    Not(Box<Condition>),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Always
    }
}

impl Condition {
    /// Flag membership predicate.
    pub fn flag(id: impl Into<String>) -> Self {
        Condition::Flag(id.into())
    }

    /// Inventory membership predicate.
    pub fn item(id: impl Into<String>) -> Self {
        Condition::Item(id.into())
    }

    /// Counter comparison predicate.
    pub fn counter(name: impl Into<String>, op: Compare, value: f64) -> Self {
        Condition::Counter {
            name: name.into(),
            op,
            value,
        }
    }

    /// Conjunction of conditions.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All(conditions.into_iter().collect())
    }

    /// Disjunction of conditions.
    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Any(conditions.into_iter().collect())
    }

    /// Negation.
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Combine with another condition under AND.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::All(mut inner) => {
                inner.push(other);
                Condition::All(inner)
            }
            lhs => Condition::All(vec![lhs, other]),
        }
    }

    /// Combine with another condition under OR.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Any(mut inner) => {
                inner.push(other);
                Condition::Any(inner)
            }
            lhs => Condition::Any(vec![lhs, other]),
        }
    }

    /// All flag ids this condition references, in expression order.
    ///
    /// Used to check authored content against a declared flag vocabulary:
    /// a guard on an undeclared flag can never become true.
    pub fn referenced_flags(&self) -> Vec<&str> {
        let mut flags = Vec::new();
        self.collect_flags(&mut flags);
        flags
    }

    fn collect_flags<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Flag(id) => out.push(id),
            Condition::All(inner) | Condition::Any(inner) => {
                for condition in inner {
                    condition.collect_flags(out);
                }
            }
            Condition::Not(inner) => inner.collect_flags(out),
            Condition::Always | Condition::Item(_) | Condition::Counter { .. } => {}
        }
    }

    /// Evaluate against a store. Pure: never mutates, always terminates.
    pub fn eval(&self, store: &StateStore) -> bool {
        match self {
            Condition::Always => true,
            Condition::Flag(id) => store.flag(id),
            Condition::Item(id) => store.has_item(id),
            Condition::Counter { name, op, value } => op.test(store.counter(name), *value),
            Condition::All(inner) => inner.iter().all(|c| c.eval(store)),
            Condition::Any(inner) => inner.iter().any(|c| c.eval(store)),
            Condition::Not(inner) => !inner.eval(store),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Always => write!(f, "always"),
            Condition::Flag(id) => write!(f, "flag({})", id),
            Condition::Item(id) => write!(f, "item({})", id),
            Condition::Counter { name, op, value } => {
                write!(f, "counter({}) {} {}", name, op, value)
            }
            Condition::All(inner) => {
                let parts: Vec<_> = inner.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(" && "))
            }
            Condition::Any(inner) => {
                let parts: Vec<_> = inner.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(" || "))
            }
            Condition::Not(inner) => write!(f, "!{}", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_predicate() {
        let mut store = StateStore::new();
        let cond = Condition::flag("metAllyA");

        assert!(!cond.eval(&store));

        store.set_flag("metAllyA").unwrap();
        assert!(cond.eval(&store));
    }

    #[test]
    fn test_unknown_references_default() {
        let store = StateStore::new();

        // Absent flag = false, absent counter = 0, absent item = false.
        assert!(!Condition::flag("never_set").eval(&store));
        assert!(!Condition::item("never_held").eval(&store));
        assert!(Condition::counter("never_touched", Compare::Eq, 0.0).eval(&store));
        assert!(!Condition::counter("never_touched", Compare::Gt, 0.0).eval(&store));
    }

    #[test]
    fn test_counter_comparisons() {
        let mut store = StateStore::new();
        store.adjust_counter("days", 3.0);

        assert!(Condition::counter("days", Compare::Ge, 3.0).eval(&store));
        assert!(Condition::counter("days", Compare::Ne, 2.0).eval(&store));
        assert!(!Condition::counter("days", Compare::Lt, 3.0).eval(&store));
    }

    #[test]
    fn test_boolean_composition() {
        let mut store = StateStore::new();
        store.set_flag("a").unwrap();
        store.add_item("key");

        let both = Condition::flag("a").and(Condition::item("key"));
        assert!(both.eval(&store));

        let either = Condition::flag("b").or(Condition::item("key"));
        assert!(either.eval(&store));

        let neither = Condition::all([Condition::flag("b"), Condition::item("key")]);
        assert!(!neither.eval(&store));

        assert!(Condition::not(Condition::flag("b")).eval(&store));
    }

    #[test]
    fn test_display() {
        let cond = Condition::flag("a").and(Condition::not(Condition::counter(
            "days",
            Compare::Ge,
            3.0,
        )));
        assert_eq!(cond.to_string(), "(flag(a) && !counter(days) >= 3)");
    }

    #[test]
    fn test_referenced_flags() {
        let cond = Condition::flag("a")
            .and(Condition::not(Condition::flag("b")))
            .and(Condition::any([
                Condition::item("key"),
                Condition::flag("c"),
                Condition::counter("days", Compare::Ge, 3.0),
            ]));
        assert_eq!(cond.referenced_flags(), vec!["a", "b", "c"]);

        assert!(Condition::item("key").referenced_flags().is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let cond = Condition::any([
            Condition::flag("a"),
            Condition::counter("days", Compare::Ge, 3.0),
        ]);

        let json = serde_json::to_string(&cond).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(cond, back);
    }
}
