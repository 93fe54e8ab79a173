// Upload guard and submission.

pub mod session;

pub use session::{UploadCandidate, UploadPolicy, UploadSession, UploadStatus};
