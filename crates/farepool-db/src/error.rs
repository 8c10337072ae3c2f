use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Domain-level persistence errors. The API layer maps each variant to an
/// HTTP status and a stable error code.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("user not found")]
    UserNotFound,
    #[error("post not found")]
    PostNotFound,
    #[error("group not found")]
    GroupNotFound,
    #[error("bill not found")]
    BillNotFound,
    #[error("location not found")]
    LocationNotFound,
    #[error("group membership not found")]
    MemberNotFound,

    #[error("username already exists")]
    UsernameTaken,
    #[error("user has already joined this group")]
    DuplicateJoin,
    #[error("group is full")]
    GroupFull,

    #[error("group is not accepting new members")]
    GroupNotJoinable,
    #[error("the host cannot leave the group")]
    HostCannotLeave,
    #[error("user is not a member of this group")]
    NotGroupMember,
    #[error("amount must be zero or greater")]
    InvalidAmount,
    #[error("group member count must be greater than zero")]
    MemberCountInvalid,

    #[error("database lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
