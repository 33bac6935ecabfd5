use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::TravelApi;
use crate::models::NewReview;

/// The mutating operations that can be deferred while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CreateReview,
    MarkVisited,
    AddFavorite,
    RemoveFavorite,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateReview => "create-review",
            ActionKind::MarkVisited => "mark-visited",
            ActionKind::AddFavorite => "add-favorite",
            ActionKind::RemoveFavorite => "remove-favorite",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred API call together with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum PendingAction {
    CreateReview(NewReview),
    #[serde(rename_all = "camelCase")]
    MarkVisited { place_id: i64 },
    #[serde(rename_all = "camelCase")]
    AddFavorite { place_id: i64 },
    #[serde(rename_all = "camelCase")]
    RemoveFavorite { place_id: i64 },
}

impl PendingAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PendingAction::CreateReview(_) => ActionKind::CreateReview,
            PendingAction::MarkVisited { .. } => ActionKind::MarkVisited,
            PendingAction::AddFavorite { .. } => ActionKind::AddFavorite,
            PendingAction::RemoveFavorite { .. } => ActionKind::RemoveFavorite,
        }
    }

    pub fn place_id(&self) -> i64 {
        match self {
            PendingAction::CreateReview(review) => review.place_id,
            PendingAction::MarkVisited { place_id }
            | PendingAction::AddFavorite { place_id }
            | PendingAction::RemoveFavorite { place_id } => *place_id,
        }
    }

    /// Perform the real API call this action stands for.
    pub async fn replay(&self, api: &dyn TravelApi) -> Result<()> {
        match self {
            PendingAction::CreateReview(review) => api.create_review(review).await.map(|_| ()),
            PendingAction::MarkVisited { place_id } => api.mark_visited(*place_id).await,
            PendingAction::AddFavorite { place_id } => api.add_favorite(*place_id).await,
            PendingAction::RemoveFavorite { place_id } => api.remove_favorite(*place_id).await,
        }
    }
}

/// An action waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    pub id: String,
    pub action: PendingAction,
    pub created_at: DateTime<Utc>,
}

impl QueuedAction {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}
