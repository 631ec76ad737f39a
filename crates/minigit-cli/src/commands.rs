//! CLI command implementations.
//!
//! Every command writes its normal output to `out` so it can be captured.

use crate::error::{CliError, Result};
use crate::http::HttpTransport;
use crate::settings::Settings;
use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use console::style;
use minigit_diff::{diff_snapshots, DiffKind, FileChange, LineDiff, LineKind};
use minigit_storage::{
    worktree, Object, ObjectId, ObjectSource, ObjectStore, Repository, Signature, Tree, TreeEntry,
};
use minigit_transfer::{clone_into, Transport};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Widest `+++---` bar printed by `diff --compact-summary`.
const MAX_BAR: usize = 40;

/// What `cat-file` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatMode {
    /// Content, with trees listed one entry per line.
    Pretty,
    /// Object type.
    Type,
    /// Payload size in bytes.
    Size,
}

/// Object kinds `hash-object` can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HashKind {
    /// Hash a file.
    #[default]
    Blob,
    /// Hash a directory.
    Tree,
}

/// What `ls-tree` prints per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    /// Mode, type, digest and name.
    #[default]
    Full,
    /// Names only.
    NameOnly,
    /// Digests only.
    HashOnly,
}

/// How `diff` reports changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffFormat {
    /// Hunks with line numbers.
    #[default]
    Patch,
    /// Changed paths only.
    NameOnly,
    /// One `path | N +++--` line per file.
    CompactSummary,
}

/// Initialize a repository in `dir`.
pub fn init(dir: &Path, out: &mut dyn Write) -> Result<()> {
    let repo = Repository::init(dir)?;
    writeln!(
        out,
        "Initialized empty Minigit repository in {}",
        repo.git_dir().display()
    )?;
    Ok(())
}

/// Print an object's content, type or size.
pub fn cat_file(cwd: &Path, spec: &str, mode: CatMode, out: &mut dyn Write) -> Result<()> {
    let repo = Repository::open(cwd)?;
    let id = resolve(&repo, spec)?;
    let object = repo.objects.read(&id)?;

    match mode {
        CatMode::Type => writeln!(out, "{}", object.object_type())?,
        CatMode::Size => writeln!(out, "{}", object.size())?,
        CatMode::Pretty => match object.as_tree() {
            Some(tree) => {
                for entry in tree.entries() {
                    writeln!(out, "{}", format_entry(entry))?;
                }
            }
            None => out.write_all(object.payload())?,
        },
    }
    Ok(())
}

/// Print the digest of a file or directory, optionally storing it.
pub fn hash_object(
    cwd: &Path,
    path: &Path,
    kind: HashKind,
    write: bool,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<()> {
    let path = cwd.join(path);
    let repo = if write { Some(open(cwd, settings)?) } else { None };

    let id = match kind {
        HashKind::Blob => {
            if path.is_dir() {
                return Err(CliError::Usage(format!(
                    "{} is a directory; use -t tree",
                    path.display()
                )));
            }
            let blob = worktree::hash_file(&path)?;
            let id = *blob.id();
            if let Some(repo) = &repo {
                repo.objects.write(&Object::from(blob))?;
            }
            id
        }
        HashKind::Tree => {
            if !path.is_dir() {
                return Err(CliError::Usage(format!(
                    "{} is not a directory",
                    path.display()
                )));
            }
            *worktree::snapshot(&path, repo.as_ref().map(|r| &r.objects))?.id()
        }
    };

    writeln!(out, "{}", id)?;
    Ok(())
}

/// List the entries of a tree, or of a commit's tree.
pub fn ls_tree(
    cwd: &Path,
    spec: &str,
    dirs_only: bool,
    format: ListFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let repo = Repository::open(cwd)?;
    let id = resolve(&repo, spec)?;
    let tree = tree_of(&repo.objects, &id)?;

    for entry in tree
        .entries()
        .iter()
        .filter(|e| !dirs_only || e.mode.is_dir())
    {
        match format {
            ListFormat::Full => writeln!(out, "{}", format_entry(entry))?,
            ListFormat::NameOnly => writeln!(out, "{}", entry.name)?,
            ListFormat::HashOnly => writeln!(out, "{}", entry.id)?,
        }
    }
    Ok(())
}

/// Snapshot the working tree, or a directory inside it, into the store.
pub fn write_tree(
    cwd: &Path,
    prefix: Option<&Path>,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<()> {
    let repo = open(cwd, settings)?;
    let dir = match prefix {
        Some(prefix) => repo.work_dir().join(prefix),
        None => repo.work_dir().to_path_buf(),
    };
    let tree = worktree::snapshot(&dir, Some(&repo.objects))?;
    writeln!(out, "{}", tree.id())?;
    Ok(())
}

/// Commit the working tree to `main`.
pub fn commit(cwd: &Path, message: &str, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    let repo = open(cwd, settings)?;
    let now = chrono::Local::now();
    let signature = Signature::new(
        &settings.author_name,
        &settings.author_email,
        now.timestamp(),
        now.format("%z").to_string(),
    );

    match repo.commit(message, signature)? {
        Some(id) => writeln!(
            out,
            "[main {}] {}",
            &id.to_hex()[..7],
            message.lines().next().unwrap_or_default()
        )?,
        None => writeln!(out, "Nothing to commit")?,
    }
    Ok(())
}

/// Print first-parent history from HEAD.
pub fn log(cwd: &Path, out: &mut dyn Write) -> Result<()> {
    let repo = Repository::open(cwd)?;
    let history = repo.log()?;
    if history.is_empty() {
        writeln!(out, "No commits yet")?;
        return Ok(());
    }

    for (i, commit) in history.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        let author = commit.author();
        writeln!(out, "{}", style(format!("commit {}", commit.id())).yellow())?;
        writeln!(out, "Author: {} <{}>", author.name, author.email)?;
        writeln!(out, "Date:   {}", format_date(author))?;
        writeln!(out)?;
        for line in commit.message().lines() {
            writeln!(out, "    {}", line)?;
        }
    }
    Ok(())
}

/// Compare a commit (HEAD by default) with the working tree.
pub fn diff(
    cwd: &Path,
    spec: Option<&str>,
    format: DiffFormat,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<()> {
    let repo = Repository::open(cwd)?;
    let base = match spec {
        Some(spec) => Some(resolve(&repo, spec)?),
        None => repo.refs.head()?,
    };
    let prev = match base {
        Some(id) => tree_of(&repo.objects, &id)?,
        None => Tree::empty(),
    };

    // working tree objects go to a throwaway store, not the repository
    let scratch_dir = TempDir::new()?;
    let scratch = ObjectStore::new(scratch_dir.path());
    let curr = worktree::snapshot(repo.work_dir(), Some(&scratch))?;

    let source = Overlay {
        primary: &repo.objects,
        scratch: &scratch,
    };
    let changes = diff_snapshots(&source, &prev, &curr)?;
    tracing::info!(
        base = ?base,
        changes = changes.len(),
        "compared working tree"
    );

    match format {
        DiffFormat::NameOnly => {
            for change in &changes {
                writeln!(out, "{}", change.path)?;
            }
        }
        DiffFormat::CompactSummary => render_summary(&changes, out)?,
        DiffFormat::Patch => {
            for change in &changes {
                render_patch(change, settings.diff_context, out)?;
            }
        }
    }
    Ok(())
}

/// Clone a smart-HTTP remote into `dest` (default: the URL's last segment).
pub fn clone(
    cwd: &Path,
    url: &str,
    dest: Option<&Path>,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<()> {
    let dest = match dest {
        Some(dest) => cwd.join(dest),
        None => cwd.join(default_clone_dir(url)?),
    };
    let transport = HttpTransport::new(url, &settings.user_agent)?;
    clone_with(&transport, &dest, settings, out)
}

/// Clone through any transport.
///
/// A destination created here is removed again if the clone fails.
pub fn clone_with(
    transport: impl Transport,
    dest: &Path,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<()> {
    let existed = dest.exists();
    if existed && fs::read_dir(dest)?.next().is_some() {
        return Err(CliError::Usage(format!(
            "destination path '{}' already exists and is not an empty directory",
            dest.display()
        )));
    }

    writeln!(out, "Cloning into '{}'...", dest.display())?;
    let result = Repository::init(dest)
        .map_err(CliError::from)
        .and_then(|repo| {
            let repo = repo.with_compression(settings.compression);
            clone_into(transport, &repo).map_err(CliError::from)
        });

    match result {
        Ok(outcome) => {
            writeln!(
                out,
                "Received {} objects, checked out {} files at {}",
                outcome.objects_written,
                outcome.files_checked_out,
                &outcome.head.to_hex()[..7]
            )?;
            Ok(())
        }
        Err(e) => {
            if !existed {
                if let Err(cleanup) = fs::remove_dir_all(dest) {
                    tracing::warn!(path = %dest.display(), error = %cleanup, "could not remove failed clone");
                }
            }
            Err(e)
        }
    }
}

fn default_clone_dir(url: &str) -> Result<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|segment| segment.trim_end_matches(".git"))
        .filter(|name| !name.is_empty() && !name.contains(':'))
        .map(str::to_string)
        .ok_or_else(|| CliError::Usage(format!("cannot derive a directory name from {}", url)))
}

fn open(dir: &Path, settings: &Settings) -> Result<Repository> {
    Ok(Repository::open(dir)?.with_compression(settings.compression))
}

/// Resolves HEAD, a branch name, a full digest or a unique digest prefix.
fn resolve(repo: &Repository, spec: &str) -> Result<ObjectId> {
    if spec == "HEAD" {
        return repo
            .refs
            .head()?
            .ok_or_else(|| CliError::Usage("HEAD does not point to a commit yet".to_string()));
    }
    if spec.len() == 40 {
        if let Ok(id) = ObjectId::from_hex(spec) {
            return Ok(id);
        }
    }
    if let Ok(Some(id)) = repo.refs.resolve(&format!("refs/heads/{}", spec)) {
        return Ok(id);
    }
    if spec.len() >= 4 && spec.bytes().all(|b| b.is_ascii_hexdigit()) {
        let prefix = spec.to_ascii_lowercase();
        let matches: Vec<ObjectId> = repo
            .objects
            .list()?
            .into_iter()
            .filter(|id| id.to_hex().starts_with(&prefix))
            .collect();
        match matches.as_slice() {
            [id] => return Ok(*id),
            [] => {}
            _ => {
                return Err(CliError::Usage(format!(
                    "short object id {} is ambiguous",
                    spec
                )))
            }
        }
    }
    Err(CliError::Usage(format!("not a valid object name: {}", spec)))
}

/// The tree an object stands for: itself, or a commit's root tree.
fn tree_of(source: &impl ObjectSource, id: &ObjectId) -> Result<Tree> {
    match source.get(id)? {
        Object::Tree(tree) => Ok(tree),
        Object::Commit(commit) => Ok(source.get_tree(commit.tree())?),
        Object::Blob(_) => Err(CliError::Usage(format!("{} is a blob, not a tree", id))),
    }
}

fn format_entry(entry: &TreeEntry) -> String {
    format!(
        "{:0>6} {} {}\t{}",
        entry.mode.as_str(),
        entry.mode.object_type(),
        entry.id,
        entry.name
    )
}

fn format_date(signature: &Signature) -> String {
    FixedOffset::east_opt(signature.offset_seconds())
        .zip(DateTime::from_timestamp(signature.timestamp, 0))
        .map(|(offset, utc)| {
            utc.with_timezone(&offset)
                .format("%a %b %e %H:%M:%S %Y %z")
                .to_string()
        })
        .unwrap_or_else(|| format!("{} {}", signature.timestamp, signature.utc_offset))
}

fn render_patch(change: &FileChange, context: usize, out: &mut dyn Write) -> Result<()> {
    let path = &change.path;
    writeln!(
        out,
        "{}",
        style(format!("diff --minigit a/{} b/{}", path, path)).bold()
    )?;

    let Some(diff) = &change.diff else {
        writeln!(out, "Kind of entry changed; no line diff")?;
        return Ok(());
    };

    let (old, new) = match change.kind {
        DiffKind::Created => ("/dev/null".to_string(), format!("b/{}", path)),
        DiffKind::Deleted => (format!("a/{}", path), "/dev/null".to_string()),
        DiffKind::Changed => (format!("a/{}", path), format!("b/{}", path)),
    };
    writeln!(out, "{}", style(format!("--- {}", old)).bold())?;
    writeln!(out, "{}", style(format!("+++ {}", new)).bold())?;

    for hunk in diff.hunks(context) {
        writeln!(out, "{}", style(hunk.header()).cyan())?;
        for line in &hunk.lines {
            writeln!(out, "{}", render_line(line))?;
        }
    }
    Ok(())
}

fn render_line(line: &LineDiff) -> String {
    let number = |n: Option<usize>| n.map(|n| n.to_string()).unwrap_or_default();
    let sign = match line.kind {
        LineKind::Unchanged => ' ',
        LineKind::Inserted => '+',
        LineKind::Deleted => '-',
    };
    let text = format!(
        "{:>4} {:>4} {}{}",
        number(line.old_line_no),
        number(line.new_line_no),
        sign,
        line.text()
    );
    match line.kind {
        LineKind::Unchanged => text,
        LineKind::Inserted => style(text).green().to_string(),
        LineKind::Deleted => style(text).red().to_string(),
    }
}

fn render_summary(changes: &[FileChange], out: &mut dyn Write) -> Result<()> {
    let width = changes.iter().map(|c| c.path.len() + 7).max().unwrap_or(0);
    let (mut insertions, mut deletions) = (0, 0);

    for change in changes {
        let (ins, del) = change.summary();
        insertions += ins;
        deletions += del;

        let label = match change.kind {
            DiffKind::Created => format!("{} (new)", change.path),
            DiffKind::Deleted => format!("{} (gone)", change.path),
            DiffKind::Changed => change.path.clone(),
        };
        let (plus, minus) = bar(ins, del);
        writeln!(
            out,
            " {:<width$} | {:>4} {}{}",
            label,
            ins + del,
            style("+".repeat(plus)).green(),
            style("-".repeat(minus)).red(),
            width = width
        )?;
    }

    if !changes.is_empty() {
        writeln!(
            out,
            " {} files changed, {} insertions(+), {} deletions(-)",
            changes.len(),
            insertions,
            deletions
        )?;
    }
    Ok(())
}

/// Scales `(insertions, deletions)` to at most [`MAX_BAR`] characters.
fn bar(ins: usize, del: usize) -> (usize, usize) {
    let total = ins + del;
    if total <= MAX_BAR {
        return (ins, del);
    }
    let plus = ins * MAX_BAR / total;
    (plus, MAX_BAR - plus)
}

/// Reads from the repository first, then from a scratch store.
struct Overlay<'a> {
    primary: &'a ObjectStore,
    scratch: &'a ObjectStore,
}

impl ObjectSource for Overlay<'_> {
    fn try_get(&self, id: &ObjectId) -> minigit_storage::Result<Option<Object>> {
        match self.primary.try_read(id)? {
            Some(object) => Ok(Some(object)),
            None => self.scratch.try_read(id),
        }
    }
}
