//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    Nickname,
    PasswordHash,
    AvatarUrl,
    CreatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Teams {
    Table,
    Id,
    Name,
    Description,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
pub enum TeamMembers {
    Table,
    TeamId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
pub enum Boards {
    Table,
    Id,
    Title,
    Description,
    OwnerId,
    TeamId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum BoardMembers {
    Table,
    BoardId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
pub enum Lists {
    Table,
    Id,
    BoardId,
    Title,
    Position,
    CreatedAt,
}

#[derive(Iden)]
pub enum Tasks {
    Table,
    Id,
    BoardId,
    ListId,
    Title,
    Description,
    Position,
    Priority,
    DueDate,
    AssigneeId,
    CreatedBy,
    Completed,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Labels {
    Table,
    Id,
    BoardId,
    Name,
    Color,
}

#[derive(Iden)]
pub enum TaskLabels {
    Table,
    TaskId,
    LabelId,
}

#[derive(Iden)]
pub enum Comments {
    Table,
    Id,
    TaskId,
    AuthorId,
    Body,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Attachments {
    Table,
    Id,
    TaskId,
    UploadedBy,
    Filename,
    ContentType,
    SizeBytes,
    StorageKey,
    CreatedAt,
}

#[derive(Iden)]
pub enum TimeEntries {
    Table,
    Id,
    TaskId,
    UserId,
    StartedAt,
    EndedAt,
    DurationSeconds,
    Note,
    CreatedAt,
}

#[derive(Iden)]
pub enum Notifications {
    Table,
    Id,
    UserId,
    Kind,
    Message,
    BoardId,
    TaskId,
    ActorId,
    IsRead,
    CreatedAt,
}

#[derive(Iden)]
pub enum Invitations {
    Table,
    Id,
    TargetType,
    TargetId,
    Email,
    Role,
    InvitedBy,
    Status,
    CreatedAt,
    ExpiresAt,
    RespondedAt,
}
