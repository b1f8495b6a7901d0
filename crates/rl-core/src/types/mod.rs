pub mod comment;
pub mod enums;
pub mod session;
pub mod vcs;

pub use comment::{Comment, NewComment, UpdateComment};
pub use enums::{DiffLineKind, DiffOp, DiffSide, FileStatus, FileType, SessionMode};
pub use session::{
    FileSummary, FileView, FinishSummary, PreviousRound, RoundSummary, SessionSnapshot,
    ShareInput,
};
pub use vcs::{DiffEntry, DiffHunk, DiffLine};
