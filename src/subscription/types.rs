use serde::{Deserialize, Serialize};

/// Outcome of the most recent sync of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubStatus {
    Normal,
    Empty,
    NetworkError,
    NameChanged,
}

impl SubStatus {
    pub fn code(self) -> i16 {
        match self {
            SubStatus::Normal => 0,
            SubStatus::Empty => 1,
            SubStatus::NetworkError => 2,
            SubStatus::NameChanged => 3,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(SubStatus::Normal),
            1 => Some(SubStatus::Empty),
            2 => Some(SubStatus::NetworkError),
            3 => Some(SubStatus::NameChanged),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubStatus::Normal => "NORMAL",
            SubStatus::Empty => "EMPTY",
            SubStatus::NetworkError => "NETWORK_ERROR",
            SubStatus::NameChanged => "NAME_CHANGED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    /// 0 until the store assigns one.
    pub id: i64,
    pub url: String,
    pub url_group: String,
    pub status: SubStatus,
}

impl Subscription {
    pub fn new(url: impl Into<String>, url_group: impl Into<String>) -> Self {
        Subscription { id: 0, url: url.into(), url_group: url_group.into(), status: SubStatus::Normal }
    }
}

// Command result envelopes

#[derive(Serialize)]
pub struct SubAddResult {
    pub created: bool,
    pub url: String,
    pub subscription: Option<Subscription>,
}

#[derive(Serialize)]
pub struct SubList {
    pub subscriptions: Vec<Subscription>,
}

#[derive(Serialize)]
pub struct SubRmPlan {
    pub action: &'static str,
    pub subscription: Subscription,
    pub profiles: usize,
}

#[derive(Serialize)]
pub struct SubRmResult {
    pub id: i64,
    pub profiles_removed: u64,
}

#[derive(Serialize)]
pub struct SubUpdateResult {
    pub id: i64,
    pub status: SubStatus,
    pub descriptors: usize,
    pub kept: usize,
    pub inserted: usize,
    pub removed: usize,
}

#[derive(Serialize)]
pub struct SubUpdateAllResult {
    pub total: usize,
    pub failed: usize,
    pub per_sub: Vec<SubOutcomeRow>,
}

#[derive(Serialize)]
pub struct SubOutcomeRow {
    pub id: i64,
    pub url_group: String,
    pub status: SubStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
