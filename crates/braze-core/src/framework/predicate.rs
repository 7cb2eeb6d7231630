//! Predicates: composable boolean tests over events.
//!
//! A [`Predicate`] decides whether a module leg should see an event. It is
//! an explicit tagged tree rather than an opaque closure so that a composed
//! condition can be inspected (`Debug` renders the tree) and each node
//! tested in isolation.
//!
//! Conjunction is left-to-right and short-circuiting: in `a.and(b)`, `b` is
//! never evaluated when `a` fails. A [`Predicate::Effect`] node always
//! passes and fires its side effect, so `p.side_effect_on_true(f)` runs `f`
//! exactly once per event for which the conjunction up to that point holds.

use std::fmt;
use std::sync::Arc;

use crate::foundation::event::Event;

type TestFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;
type EffectFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// A composable boolean test over an [`Event`].
#[derive(Clone)]
pub enum Predicate {
    /// Always the given value.
    Const(bool),
    /// Both sides hold; the right side is skipped when the left fails.
    And(Box<Predicate>, Box<Predicate>),
    /// The inner predicate fails.
    Not(Box<Predicate>),
    /// A labeled custom test.
    Custom(String, TestFn),
    /// Fires a side effect and passes.
    Effect(EffectFn),
}

impl Predicate {
    /// A predicate that matches every event.
    pub fn always() -> Self {
        Predicate::Const(true)
    }

    /// A predicate that matches no event.
    pub fn never() -> Self {
        Predicate::Const(false)
    }

    /// A labeled custom test.
    pub fn custom<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(label.into(), Arc::new(f))
    }

    /// Matches events that carry non-empty text.
    pub fn non_empty() -> Self {
        Self::custom("non_empty", |event| !event.text.is_empty())
    }

    /// Matches events that carry a sticker.
    pub fn has_sticker() -> Self {
        Self::custom("has_sticker", |event| event.has_sticker)
    }

    /// Matches any command.
    pub fn any_command() -> Self {
        Self::custom("any_command", |event| event.is_command())
    }

    /// Matches the command named `name`.
    pub fn is_command(name: impl Into<String>) -> Self {
        let name = name.into();
        let label = format!("is_command({name})");
        Self::non_empty()
            .and(Self::any_command())
            .and(Self::custom(label, move |event| {
                event.command_name() == Some(name.as_str())
            }))
    }

    /// Matches any of the given command names.
    pub fn is_any_of(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let label = format!("is_any_of({})", names.join(", "));
        Self::non_empty()
            .and(Self::any_command())
            .and(Self::custom(label, move |event| {
                event
                    .command_name()
                    .is_some_and(|n| names.iter().any(|want| want == n))
            }))
    }

    /// Left-to-right short-circuiting conjunction.
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Attaches a side effect fired exactly once when the conjunction up to
    /// this point holds for an event.
    pub fn side_effect_on_true<F>(self, effect: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.and(Predicate::Effect(Arc::new(effect)))
    }

    /// Evaluates the predicate against an event.
    pub fn test(&self, event: &Event) -> bool {
        match self {
            Predicate::Const(value) => *value,
            Predicate::And(lhs, rhs) => lhs.test(event) && rhs.test(event),
            Predicate::Not(inner) => !inner.test(event),
            Predicate::Custom(_, f) => f(event),
            Predicate::Effect(effect) => {
                effect(event);
                true
            }
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(value) => write!(f, "Const({value})"),
            Predicate::And(lhs, rhs) => write!(f, "And({lhs:?}, {rhs:?})"),
            Predicate::Not(inner) => write!(f, "Not({inner:?})"),
            Predicate::Custom(label, _) => write!(f, "Custom({label})"),
            Predicate::Effect(_) => write!(f, "Effect"),
        }
    }
}
