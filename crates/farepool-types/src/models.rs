use serde::{Deserialize, Serialize};

/// Lifecycle of a ride offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Open,
    Closed,
    Expired,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Open => "OPEN",
            PostStatus::Closed => "CLOSED",
            PostStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PostStatus::Open),
            "CLOSED" => Some(PostStatus::Closed),
            "EXPIRED" => Some(PostStatus::Expired),
            _ => None,
        }
    }
}

/// Lifecycle of the joinable group behind a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    Waiting,
    InProgress,
    Completed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Waiting => "WAITING",
            GroupStatus::InProgress => "IN_PROGRESS",
            GroupStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(GroupStatus::Waiting),
            "IN_PROGRESS" => Some(GroupStatus::InProgress),
            "COMPLETED" => Some(GroupStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Wait,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Wait => "WAIT",
            PaymentStatus::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAIT" => Some(PaymentStatus::Wait),
            "PAID" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Pending,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "PENDING",
            BillStatus::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BillStatus::Pending),
            "PAID" => Some(BillStatus::Paid),
            _ => None,
        }
    }
}

/// Which member count divides a bill when its share is computed.
///
/// Shares historically drifted with live membership. Both behaviors are
/// supported and the server picks one at startup from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillShareBasis {
    /// Divide by the group's member count at read time (share drifts).
    #[default]
    Live,
    /// Divide by the member count captured when the bill was created.
    Frozen,
}

impl BillShareBasis {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live" => Some(BillShareBasis::Live),
            "frozen" => Some(BillShareBasis::Frozen),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in ["OPEN", "CLOSED", "EXPIRED"] {
            assert_eq!(PostStatus::parse(s).unwrap().as_str(), s);
        }
        for s in ["WAITING", "IN_PROGRESS", "COMPLETED"] {
            assert_eq!(GroupStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(PostStatus::parse("open").is_none());
    }
}
