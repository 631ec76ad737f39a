//! Smart-HTTP fetch for Minigit.
//!
//! This crate implements the client half of the git smart HTTP protocol:
//! pkt-line framing, ref discovery, pack file decoding with REF_DELTA
//! resolution, and a clone pipeline that persists a remote HEAD into a
//! local [`Repository`](minigit_storage::Repository).

pub mod delta;
mod error;
mod fetch;
mod pack;
mod pktline;
mod protocol;
mod transport;

pub use delta::{apply_delta, DeltaEncoder, DeltaObject};
pub use error::TransferError;
pub use fetch::{clone_into, CloneOutcome, Fetcher};
pub use pack::{PackBuilder, PackContents, PackParser};
pub use pktline::{PktLine, PktLineReader, PktLineWriter, MAX_PKT_LEN};
pub use protocol::{
    split_pack_response, upload_pack_request, RefAdvertisement, RefDiscovery, INFO_REFS_PATH,
    UPLOAD_PACK_PATH, UPLOAD_PACK_REQUEST_TYPE, UPLOAD_PACK_SERVICE,
};
pub use transport::Transport;

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
