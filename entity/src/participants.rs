use crate::users::UserInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Where a participant stands on an invitation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Invited,
    Accepted,
    Declined,
}

impl fmt::Display for Status {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Invited => write!(fmt, "invited"),
            Status::Accepted => write!(fmt, "accepted"),
            Status::Declined => write!(fmt, "declined"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StatusParseError;

impl FromStr for Status {
    type Err = StatusParseError;
    fn from_str(status: &str) -> Result<Status, Self::Err> {
        match status {
            "invited" => Ok(Status::Invited),
            "accepted" => Ok(Status::Accepted),
            "declined" => Ok(Status::Declined),
            _ => Err(StatusParseError),
        }
    }
}

/// A user's participation in an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = participants::Model)]
pub struct Model {
    pub user: UserInfo,
    pub status: Status,
    pub invited_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}
