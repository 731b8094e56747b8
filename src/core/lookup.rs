//! Three-way outcome for external lookups
//!
//! "Value absent" and "lookup broke" need different fallbacks (a missing digest skips a
//! check, an unreachable one forces a rebuild), so they are separate variants instead of
//! an `Option` wrapped in a `Result`.

/// Outcome of asking an external system for a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
  /// The value exists
  Found(T),
  /// The system answered: there is no such value
  NotFound,
  /// The system could not be asked (network, timeout, malformed answer)
  Failed(String),
}

impl<T> Lookup<T> {
  /// Map the found value, keeping the other outcomes
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
    match self {
      Lookup::Found(value) => Lookup::Found(f(value)),
      Lookup::NotFound => Lookup::NotFound,
      Lookup::Failed(detail) => Lookup::Failed(detail),
    }
  }

  /// The found value, or None for both other outcomes
  pub fn found(self) -> Option<T> {
    match self {
      Lookup::Found(value) => Some(value),
      _ => None,
    }
  }
}
