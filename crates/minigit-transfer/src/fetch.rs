//! Fetch and clone over a [`Transport`].
//!
//! A clone discovers the remote HEAD, downloads and decodes the whole pack
//! in memory, and only then writes objects, the `main` ref and the working
//! tree. A bad advertisement or pack leaves the local store untouched.

use crate::pack::{PackContents, PackParser};
use crate::protocol::{
    split_pack_response, upload_pack_request, RefDiscovery, INFO_REFS_PATH, UPLOAD_PACK_PATH,
    UPLOAD_PACK_REQUEST_TYPE,
};
use crate::transport::Transport;
use crate::{Result, TransferError};
use minigit_storage::{
    worktree, EntryMode, Object, ObjectId, ObjectSource, Repository, Tree, MAIN_BRANCH,
};

/// Runs the two-request fetch exchange against one remote.
pub struct Fetcher<T> {
    transport: T,
}

impl<T: Transport> Fetcher<T> {
    /// Creates a fetcher over a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Asks the remote for its refs.
    pub fn discover(&self) -> Result<RefDiscovery> {
        let body = self.transport.get(INFO_REFS_PATH)?;
        RefDiscovery::parse(&body)
    }

    /// Requests everything reachable from `want` and decodes the pack.
    ///
    /// Nothing is persisted.
    pub fn fetch_pack(&self, want: &ObjectId) -> Result<PackContents> {
        let request = upload_pack_request(want);
        let body = self
            .transport
            .post(UPLOAD_PACK_PATH, &request, UPLOAD_PACK_REQUEST_TYPE)?;
        let pack = split_pack_response(&body)?;
        PackParser::new(pack).parse()
    }
}

/// What a clone produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// The commit `main` now points to.
    pub head: ObjectId,
    /// Number of objects written to the store.
    pub objects_written: usize,
    /// Number of files checked out into the working directory.
    pub files_checked_out: usize,
}

/// Clones the remote HEAD into `repo`.
pub fn clone_into<T: Transport>(transport: T, repo: &Repository) -> Result<CloneOutcome> {
    let fetcher = Fetcher::new(transport);

    let discovery = fetcher.discover()?;
    let head = discovery.head;
    tracing::info!(
        head = %head,
        branch = discovery.symref_target().unwrap_or("HEAD"),
        "discovered remote HEAD"
    );

    let contents = fetcher.fetch_pack(&head)?;
    tracing::info!(objects = contents.len(), "decoded pack");

    let tree = match contents.get(&head) {
        Some(Object::Commit(commit)) => contents.get_tree(commit.tree())?,
        Some(other) => {
            return Err(TransferError::Protocol(format!(
                "remote HEAD {} is a {}, not a commit",
                head,
                other.object_type()
            )))
        }
        None => {
            return Err(TransferError::Protocol(format!(
                "pack does not contain remote HEAD {}",
                head
            )))
        }
    };
    ensure_complete(&contents, &tree)?;

    let mut objects_written = 0;
    for object in contents.iter() {
        repo.objects.write(object)?;
        objects_written += 1;
    }
    repo.refs.write_direct(MAIN_BRANCH, &head)?;

    let files_checked_out = worktree::checkout(&contents, &tree, repo.work_dir())?;
    tracing::info!(
        head = %head,
        objects = objects_written,
        files = files_checked_out,
        "clone complete"
    );

    Ok(CloneOutcome {
        head,
        objects_written,
        files_checked_out,
    })
}

/// Checks that every tree and blob below `tree` is in the pack.
fn ensure_complete(contents: &PackContents, tree: &Tree) -> Result<()> {
    for entry in tree.entries() {
        match entry.mode {
            EntryMode::Directory => ensure_complete(contents, &contents.get_tree(&entry.id)?)?,
            EntryMode::Gitlink => {}
            _ => {
                contents.get_blob(&entry.id)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaEncoder;
    use crate::pack::PackBuilder;
    use crate::pktline::{PktLine, PktLineWriter};
    use minigit_storage::{Blob, Commit, ObjectType, Signature, TreeEntry};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Serves canned bodies and records requests.
    #[derive(Default)]
    struct FakeTransport {
        responses: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<(String, Vec<u8>, Option<String>)>>,
    }

    impl Transport for FakeTransport {
        fn get(&self, path: &str) -> Result<Vec<u8>> {
            self.requests
                .borrow_mut()
                .push((path.to_string(), Vec::new(), None));
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| TransferError::Transport(format!("404 for {}", path)))
        }

        fn post(&self, path: &str, body: &[u8], content_type: &str) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push((
                path.to_string(),
                body.to_vec(),
                Some(content_type.to_string()),
            ));
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| TransferError::Transport(format!("404 for {}", path)))
        }
    }

    fn advertise(head: &ObjectId) -> Vec<u8> {
        let mut writer = PktLineWriter::new(Vec::new());
        writer.write_line("# service=git-upload-pack").unwrap();
        writer.flush_pkt().unwrap();
        writer
            .write(&PktLine::from_string(&format!(
                "{} HEAD\0symref=HEAD:refs/heads/main\n",
                head
            )))
            .unwrap();
        writer.write_line(&format!("{} refs/heads/main", head)).unwrap();
        writer.flush_pkt().unwrap();
        writer.into_inner()
    }

    fn respond(pack: Vec<u8>) -> Vec<u8> {
        let mut body = PktLine::from_string("NAK\n").encode();
        body.extend_from_slice(&pack);
        body
    }

    /// A commit whose tree holds `hello.txt` and `src/main.rs`.
    fn remote_objects() -> (ObjectId, Vec<Object>) {
        let hello = Blob::new(b"hello\n".to_vec());
        let main = Blob::new(b"fn main() {}\n".to_vec());
        let src = Tree::new(vec![TreeEntry::new(EntryMode::File, "main.rs", *main.id())]).unwrap();
        let root = Tree::new(vec![
            TreeEntry::new(EntryMode::File, "hello.txt", *hello.id()),
            TreeEntry::new(EntryMode::Directory, "src", *src.id()),
        ])
        .unwrap();
        let author = Signature::new("Remote", "remote@example.com", 1_700_000_000, "+0000");
        let commit = Commit::new(*root.id(), None, author.clone(), author, "Initial commit");

        let head = *commit.id();
        let objects = vec![
            Object::from(commit),
            Object::from(root),
            Object::from(src),
            Object::from(hello),
            Object::from(main),
        ];
        (head, objects)
    }

    fn serving(head: &ObjectId, objects: &[Object]) -> FakeTransport {
        let mut builder = PackBuilder::new();
        for object in objects {
            builder.add(object.clone());
        }
        serving_pack(head, builder.build().unwrap())
    }

    fn serving_pack(head: &ObjectId, pack: Vec<u8>) -> FakeTransport {
        let mut transport = FakeTransport::default();
        transport
            .responses
            .insert(INFO_REFS_PATH.to_string(), advertise(head));
        transport
            .responses
            .insert(UPLOAD_PACK_PATH.to_string(), respond(pack));
        transport
    }

    #[test]
    fn test_fetch_pack_sends_want() {
        let (head, objects) = remote_objects();
        let transport = serving(&head, &objects);
        let fetcher = Fetcher::new(&transport);

        let discovery = fetcher.discover().unwrap();
        assert_eq!(discovery.head, head);

        let contents = fetcher.fetch_pack(&head).unwrap();
        assert_eq!(contents.len(), 5);

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].0, INFO_REFS_PATH);
        assert_eq!(requests[1].0, UPLOAD_PACK_PATH);
        assert_eq!(requests[1].1, upload_pack_request(&head));
        assert_eq!(requests[1].2.as_deref(), Some(UPLOAD_PACK_REQUEST_TYPE));
    }

    #[test]
    fn test_clone_into() {
        let (head, objects) = remote_objects();
        let transport = serving(&head, &objects);
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let outcome = clone_into(&transport, &repo).unwrap();
        assert_eq!(outcome.head, head);
        assert_eq!(outcome.objects_written, 5);
        assert_eq!(outcome.files_checked_out, 2);

        assert_eq!(repo.refs.head().unwrap(), Some(head));
        for object in &objects {
            assert!(repo.objects.contains(object.id()));
        }
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
    }

    #[test]
    fn test_clone_missing_blob_writes_nothing() {
        let (head, mut objects) = remote_objects();
        objects.pop();
        let transport = serving(&head, &objects);
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        assert!(clone_into(&transport, &repo).is_err());
        assert!(repo.objects.list().unwrap().is_empty());
        assert_eq!(repo.refs.head().unwrap(), None);
    }

    #[test]
    fn test_clone_rejects_git_dir_in_tree() {
        let (_, objects) = remote_objects();
        let root = objects[1].clone();
        let hello = objects[3].clone();

        let evil_head = Blob::new(b"ref: refs/heads/evil\n".to_vec());
        let git_dir =
            Tree::new(vec![TreeEntry::new(EntryMode::File, "HEAD", *evil_head.id())]).unwrap();

        // Tree::new refuses this name, so the payload is written by hand and
        // shipped as a delta against a legitimate tree.
        let mut payload = b"40000 .git\0".to_vec();
        payload.extend_from_slice(git_dir.id().as_bytes());
        payload.extend_from_slice(b"100644 hello.txt\0");
        payload.extend_from_slice(hello.id().as_bytes());
        let evil_root = ObjectId::hash_object(ObjectType::Tree, &payload);

        let author = Signature::new("Remote", "remote@example.com", 1_700_000_000, "+0000");
        let commit = Commit::new(evil_root, None, author.clone(), author, "Take over HEAD");
        let head = *commit.id();

        let mut builder = PackBuilder::new();
        builder.add(Object::from(commit));
        builder.add(root.clone());
        builder.add_ref_delta(
            *root.id(),
            DeltaEncoder::new(root.size()).insert(&payload).finish(),
        );
        builder.add(Object::from(git_dir));
        builder.add(Object::from(evil_head));
        builder.add(hello);
        let transport = serving_pack(&head, builder.build().unwrap());

        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let err = clone_into(&transport, &repo).unwrap_err();

        assert!(matches!(err, TransferError::Storage(_)));
        assert!(repo.objects.list().unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join(".git/HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
    }

    #[test]
    fn test_clone_head_not_in_pack() {
        let (head, objects) = remote_objects();
        let transport = serving(&head, &objects[1..]);
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let err = clone_into(&transport, &repo).unwrap_err();
        assert!(err.is_protocol());
        assert!(repo.objects.list().unwrap().is_empty());
    }

    #[test]
    fn test_clone_head_not_a_commit() {
        let (_, objects) = remote_objects();
        let blob_id = *objects[3].id();
        let transport = serving(&blob_id, &objects);
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let err = clone_into(&transport, &repo).unwrap_err();
        assert!(err.to_string().contains("not a commit"));
    }

    #[test]
    fn test_transport_failure_propagates() {
        let transport = FakeTransport::default();
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let err = clone_into(&transport, &repo).unwrap_err();
        assert!(matches!(err, TransferError::Transport(_)));
        assert!(!err.is_protocol());
    }
}
