//! Loading-state lifecycle for remote operations.
//!
//! Every load call moves through `Idle -> Loading -> Success | Error` exactly
//! once and carries wall-clock timing for diagnostics. The state is published
//! through a watch channel by the loader; it informs observers and never
//! gates correctness.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadingState<T> {
    pub status: LoadingStatus,
    pub data: Option<T>,
    pub error: Option<LoadingError>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadingError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl<T> LoadingState<T> {
    pub fn idle() -> Self {
        Self {
            status: LoadingStatus::Idle,
            data: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn loading(start_time: DateTime<Utc>) -> Self {
        Self {
            status: LoadingStatus::Loading,
            data: None,
            error: None,
            start_time: Some(start_time),
            end_time: None,
        }
    }

    pub fn success(data: T, start_time: Option<DateTime<Utc>>) -> Self {
        Self {
            status: LoadingStatus::Success,
            data: Some(data),
            error: None,
            start_time,
            end_time: Some(Utc::now()),
        }
    }

    pub fn error(error: LoadingError, start_time: Option<DateTime<Utc>>) -> Self {
        Self {
            status: LoadingStatus::Error,
            data: None,
            error: Some(error),
            start_time,
            end_time: Some(Utc::now()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadingStatus::Loading
    }

    pub fn has_data(&self) -> bool {
        self.status == LoadingStatus::Success && self.data.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.status == LoadingStatus::Error
    }

    /// Elapsed time of a completed operation, if both stamps are present.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

impl<T> Default for LoadingState<T> {
    fn default() -> Self {
        Self::idle()
    }
}
