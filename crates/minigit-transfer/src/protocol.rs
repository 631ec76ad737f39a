//! Git smart HTTP protocol, client side.
//!
//! A fetch is two requests: `GET info/refs?service=git-upload-pack` to
//! discover the remote refs, then `POST git-upload-pack` naming the wanted
//! commit. The reply to the POST is one acknowledgement packet followed by
//! the raw pack file.
//! See: https://git-scm.com/docs/http-protocol

use crate::pktline::{PktLine, PktLineReader};
use crate::{Result, TransferError};
use minigit_storage::ObjectId;

/// Service name used for fetching.
pub const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";

/// Ref discovery path, relative to the repository URL.
pub const INFO_REFS_PATH: &str = "info/refs?service=git-upload-pack";

/// Pack negotiation path, relative to the repository URL.
pub const UPLOAD_PACK_PATH: &str = "git-upload-pack";

/// Content type of the negotiation request body.
pub const UPLOAD_PACK_REQUEST_TYPE: &str = "application/x-git-upload-pack-request";

const SERVICE_ANNOUNCEMENT: &[u8] = b"# service=git-upload-pack\n";

/// A reference advertisement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAdvertisement {
    /// Object ID the ref points to.
    pub id: ObjectId,
    /// Reference name.
    pub name: String,
}

/// The parsed reply to a ref discovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefDiscovery {
    /// The commit HEAD points to.
    pub head: ObjectId,
    /// Capabilities advertised on the HEAD line.
    pub capabilities: Vec<String>,
    /// Every ref advertised after HEAD, in order.
    pub refs: Vec<RefAdvertisement>,
}

impl RefDiscovery {
    /// Parses a ref advertisement.
    ///
    /// The grammar is strict: service announcement, flush, the HEAD line
    /// with capabilities, further refs, flush, and nothing after.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut rest = body;
        let mut reader = PktLineReader::new(&mut rest);

        match reader.read()? {
            Some(PktLine::Data(data)) if data == SERVICE_ANNOUNCEMENT => {}
            other => {
                return Err(unexpected("service announcement", other.as_ref()));
            }
        }
        match reader.read()? {
            Some(PktLine::Flush) => {}
            other => return Err(unexpected("flush after announcement", other.as_ref())),
        }

        let (head, capabilities) = match reader.read()? {
            Some(PktLine::Data(data)) => {
                let (line, caps) = split_capabilities(&data)?;
                let head = parse_ref_line(line)?;
                if head.name != "HEAD" {
                    return Err(TransferError::Protocol(format!(
                        "first advertised ref is {}, expected HEAD",
                        head.name
                    )));
                }
                (head.id, caps)
            }
            other => return Err(unexpected("HEAD line", other.as_ref())),
        };

        let mut refs = Vec::new();
        loop {
            match reader.read()? {
                Some(PktLine::Flush) => break,
                Some(PktLine::Data(data)) => {
                    let line = data.strip_suffix(b"\n").ok_or_else(|| {
                        TransferError::Protocol("ref line without newline".to_string())
                    })?;
                    refs.push(parse_ref_line(line)?);
                }
                None => {
                    return Err(TransferError::Protocol(
                        "ref advertisement is missing its final flush".to_string(),
                    ))
                }
            }
        }

        drop(reader);
        if !rest.is_empty() {
            return Err(TransferError::Protocol(format!(
                "{} unexpected bytes after ref advertisement",
                rest.len()
            )));
        }

        tracing::debug!(
            head = %head,
            refs = refs.len(),
            capabilities = capabilities.len(),
            "parsed ref advertisement"
        );
        Ok(Self {
            head,
            capabilities,
            refs,
        })
    }

    /// The ref HEAD points to, from the `symref=HEAD:<ref>` capability.
    pub fn symref_target(&self) -> Option<&str> {
        self.capabilities
            .iter()
            .find_map(|cap| cap.strip_prefix("symref=HEAD:"))
    }

    /// Returns true if the remote advertised a capability, with or without a
    /// value.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|cap| {
            cap == name
                || cap
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    }
}

/// Splits `<ref line>\0<capabilities>\n`.
fn split_capabilities(data: &[u8]) -> Result<(&[u8], Vec<String>)> {
    let body = data
        .strip_suffix(b"\n")
        .ok_or_else(|| TransferError::Protocol("HEAD line without newline".to_string()))?;
    let nul = body
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| TransferError::Protocol("HEAD line has no capability list".to_string()))?;

    let caps = std::str::from_utf8(&body[nul + 1..])
        .map_err(|_| TransferError::Protocol("capabilities are not UTF-8".to_string()))?
        .split(' ')
        .filter(|cap| !cap.is_empty())
        .map(str::to_string)
        .collect();
    Ok((&body[..nul], caps))
}

/// Parses `<40 hex> <name>`.
fn parse_ref_line(line: &[u8]) -> Result<RefAdvertisement> {
    let line = std::str::from_utf8(line)
        .map_err(|_| TransferError::Protocol("ref line is not UTF-8".to_string()))?;
    let (hex, name) = line
        .split_once(' ')
        .ok_or_else(|| TransferError::Protocol(format!("malformed ref line: {:?}", line)))?;
    if hex.len() != 40 || name.is_empty() {
        return Err(TransferError::Protocol(format!("malformed ref line: {:?}", line)));
    }
    let id = ObjectId::from_hex(hex)
        .map_err(|_| TransferError::Protocol(format!("invalid object id: {:?}", hex)))?;
    Ok(RefAdvertisement {
        id,
        name: name.to_string(),
    })
}

fn unexpected(expected: &str, got: Option<&PktLine>) -> TransferError {
    let got = match got {
        None => "end of input".to_string(),
        Some(PktLine::Flush) => "flush".to_string(),
        Some(PktLine::Data(data)) => format!("{:?}", String::from_utf8_lossy(data)),
    };
    TransferError::Protocol(format!("expected {}, got {}", expected, got))
}

/// Builds the negotiation body asking for everything reachable from `want`.
pub fn upload_pack_request(want: &ObjectId) -> Vec<u8> {
    let mut body = PktLine::from_string(&format!("want {}\n", want)).encode();
    body.extend_from_slice(&PktLine::Flush.encode());
    body.extend_from_slice(&PktLine::from_string("done\n").encode());
    body
}

/// Strips the acknowledgement packet from a negotiation reply, returning
/// the pack bytes that follow it.
pub fn split_pack_response(body: &[u8]) -> Result<&[u8]> {
    let mut rest = body;
    let ack = PktLineReader::new(&mut rest).read()?;

    match ack.as_ref().and_then(PktLine::as_str) {
        Some("NAK") => {}
        Some(line) if line.starts_with("ACK ") => {}
        _ => return Err(unexpected("NAK or ACK", ack.as_ref())),
    }

    tracing::debug!(pack_bytes = rest.len(), "received pack");
    Ok(rest)
}
