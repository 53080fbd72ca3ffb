//! Screen load state.

use serde::Serialize;

use crate::error::Result;

/// The four mutually exclusive states of a screen backed by a remote fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum LoadState<T> {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The last request failed with this message.
    Error(String),
    /// The last request succeeded.
    Loaded(T),
}

impl<T> LoadState<T> {
    /// Settle a finished request into `Loaded` or `Error`.
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Loaded(value),
            Err(e) => Self::Error(e.to_string()),
        }
    }

    /// Whether a request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The loaded data, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// The error message, if the last request failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Map the loaded data, keeping the other states.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadState<U> {
        match self {
            Self::Idle => LoadState::Idle,
            Self::Loading => LoadState::Loading,
            Self::Error(message) => LoadState::Error(message),
            Self::Loaded(value) => LoadState::Loaded(f(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_is_idle() {
        let state: LoadState<u32> = LoadState::default();
        assert_eq!(state, LoadState::Idle);
        assert!(state.data().is_none());
        assert!(state.error().is_none());
    }

    #[test]
    fn test_from_result() {
        assert_eq!(LoadState::from_result(Ok(3)), LoadState::Loaded(3));

        let failed: LoadState<u32> =
            LoadState::from_result(Err(Error::not_found("vehicle record", 9)));
        assert!(failed.error().unwrap().contains('9'));
        assert!(!failed.is_loading());
    }

    #[test]
    fn test_map_keeps_state() {
        assert_eq!(LoadState::Loaded(2).map(|n| n * 10), LoadState::Loaded(20));
        assert_eq!(
            LoadState::<u32>::Loading.map(|n| n * 10),
            LoadState::Loading
        );
    }

    #[test]
    fn test_serializes_tagged() {
        let json = serde_json::to_value(LoadState::Loaded(vec![1])).unwrap();
        assert_eq!(json["state"], "loaded");
        assert_eq!(json["data"][0], 1);
        let json = serde_json::to_value(LoadState::<u8>::Loading).unwrap();
        assert_eq!(json["state"], "loading");
    }
}
