//! Device-side operations built on a [`crate::remote::RemoteTree`].

mod lock;
mod remarkable;

pub use lock::UserLocks;
pub use remarkable::{CommitPolicy, RemarkableStrategy, UploadRequest};
