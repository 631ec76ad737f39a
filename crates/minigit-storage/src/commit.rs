//! Commit objects.
//!
//! ```text
//! tree <hex>
//! [parent <hex>]
//! author <name> <<email>> <unix seconds> <utc offset>
//! committer <name> <<email>> <unix seconds> <utc offset>
//!
//! <message>
//! ```

use crate::{ObjectId, ObjectType, Result, StorageError};
use bytes::Bytes;
use std::fmt;

/// Author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address, without angle brackets.
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// UTC offset as written by git, e.g. `+0100`.
    pub utc_offset: String,
}

impl Signature {
    /// Creates a new signature.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp: i64,
        utc_offset: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            utc_offset: utc_offset.into(),
        }
    }

    /// Parses `Name <email> <seconds> <offset>`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || StorageError::format(format!("invalid signature: {}", s));

        let (rest, utc_offset) = s.rsplit_once(' ').ok_or_else(invalid)?;
        let (ident, timestamp) = rest.rsplit_once(' ').ok_or_else(invalid)?;
        let timestamp: i64 = timestamp.parse().map_err(|_| invalid())?;

        let valid_offset = utc_offset.len() == 5
            && matches!(utc_offset.as_bytes()[0], b'+' | b'-')
            && utc_offset.bytes().skip(1).all(|b| b.is_ascii_digit());
        if !valid_offset {
            return Err(invalid());
        }

        let open = ident.find('<').ok_or_else(invalid)?;
        let close = ident.rfind('>').ok_or_else(invalid)?;
        if close < open {
            return Err(invalid());
        }

        Ok(Self {
            name: ident[..open].trim_end().to_string(),
            email: ident[open + 1..close].to_string(),
            timestamp,
            utc_offset: utc_offset.to_string(),
        })
    }

    /// The offset from UTC in seconds (`+0130` is 5400).
    pub fn offset_seconds(&self) -> i32 {
        let field = |range: std::ops::Range<usize>| -> i32 {
            self.utc_offset
                .get(range)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        };
        let hours = field(1..3);
        let minutes = field(3..5);
        let seconds = hours * 3600 + minutes * 60;
        if self.utc_offset.starts_with('-') {
            -seconds
        } else {
            seconds
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.utc_offset
        )
    }
}

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    id: ObjectId,
    tree: ObjectId,
    parents: Vec<ObjectId>,
    author: Signature,
    committer: Signature,
    message: String,
    data: Bytes,
}

impl Commit {
    /// Creates a commit, rendering the canonical payload.
    pub fn new(
        tree: ObjectId,
        parent: Option<ObjectId>,
        author: Signature,
        committer: Signature,
        message: &str,
    ) -> Self {
        let message = format!("{}\n", message.trim_end());

        let mut content = format!("tree {}\n", tree);
        if let Some(parent) = &parent {
            content.push_str(&format!("parent {}\n", parent));
        }
        content.push_str(&format!("author {}\n", author));
        content.push_str(&format!("committer {}\n", committer));
        content.push('\n');
        content.push_str(&message);

        let data = Bytes::from(content.into_bytes());
        Self {
            id: ObjectId::hash_object(ObjectType::Commit, &data),
            tree,
            parents: parent.into_iter().collect(),
            author,
            committer,
            message,
            data,
        }
    }

    /// Parses a commit payload.
    ///
    /// The payload is kept verbatim; headers other than `tree`, `parent`,
    /// `author` and `committer` (for example `gpgsig`) are preserved but not
    /// interpreted. Text in other encodings (see the `encoding` header) is
    /// decoded lossily; the digest is always taken over the original bytes.
    pub fn decode(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let decoded = String::from_utf8_lossy(&data);
        let text: &str = &decoded;

        let (headers, message) = match text.split_once("\n\n") {
            Some((headers, message)) => (headers, message),
            None => (text.strip_suffix('\n').unwrap_or(text), ""),
        };

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            if line.starts_with(' ') {
                // continuation of a multi-line header
                continue;
            }
            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            match key {
                "tree" if tree.is_none() => tree = Some(ObjectId::from_hex(value)?),
                "tree" => return Err(StorageError::format("commit has two tree headers")),
                "parent" => parents.push(ObjectId::from_hex(value)?),
                "author" if author.is_none() => author = Some(Signature::parse(value)?),
                "committer" if committer.is_none() => {
                    committer = Some(Signature::parse(value)?)
                }
                _ => {}
            }
        }

        let tree = tree.ok_or_else(|| StorageError::format("commit is missing a tree"))?;
        let author = author.ok_or_else(|| StorageError::format("commit is missing an author"))?;
        let committer = committer.unwrap_or_else(|| author.clone());

        Ok(Self {
            id: ObjectId::hash_object(ObjectType::Commit, &data),
            tree,
            parents,
            author,
            committer,
            message: message.to_string(),
            data: data.clone(),
        })
    }

    /// The commit's digest.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Digest of the root tree.
    pub fn tree(&self) -> &ObjectId {
        &self.tree
    }

    /// The first parent, or `None` for a root commit.
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// All parents in header order.
    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    /// Who wrote the change.
    pub fn author(&self) -> &Signature {
        &self.author
    }

    /// Who recorded the commit.
    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    /// The commit message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The first line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// The encoded payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}
