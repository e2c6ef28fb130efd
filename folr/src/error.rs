//! Process exit codes
//!
//! Codes follow sysexits.h where one fits.

use folio::error::{ErrorKind, FolioError};

const EX_FAILURE: i32 = 1;
const EX_DATAERR: i32 = 65;
const EX_NOINPUT: i32 = 66;
const EX_UNAVAILABLE: i32 = 69;
const EX_IOERR: i32 = 74;
const EX_NOPERM: i32 = 77;

/// Failed mutations arrive as `FolioError::MutationFailed` and keep the kind of their cause.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<FolioError>() {
        Some(err) => code_for(err.kind()),
        None => EX_FAILURE,
    }
}

fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation | ErrorKind::Data => EX_DATAERR,
        ErrorKind::NotFound => EX_NOINPUT,
        ErrorKind::Unavailable => EX_UNAVAILABLE,
        ErrorKind::Storage => EX_IOERR,
        ErrorKind::Unauthorized | ErrorKind::Forbidden => EX_NOPERM,
        ErrorKind::Other => EX_FAILURE,
    }
}
