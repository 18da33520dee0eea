//! Shared fixtures: fake backend tools and history files
//!
//! The fake tools are POSIX shell scripts that honour the same command lines as
//! the real ones. They are written once per test binary, before any of them runs.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use revget::{RepositoryType, RetrievalConfig, RevisionService};
use tempfile::TempDir;

/// `sccs get -p -r<rev> s.<name>`: prints the revision from a `@@rev` sectioned history
const FAKE_SCCS: &str = r#"#!/bin/sh
[ "$1" = "get" ] || { echo "fake sccs: unsupported command $1" >&2; exit 2; }
[ "$2" = "-p" ] || { echo "fake sccs: expected -p" >&2; exit 2; }
rev="${3#-r}"
hist="$4"
[ -f "$hist" ] || { echo "ERROR [$hist]: file doesn't exist" >&2; exit 1; }
awk -v rev="$rev" '
  /^@@rev / { on = ($2 "" == rev ""); if (on) found = 1; next }
  on { print }
  END { exit found ? 0 : 1 }
' "$hist" || { echo "ERROR [$hist]: nonexistent sid (ge5)" >&2; exit 1; }
"#;

/// `cleartool get -to <dest> <name>@@<rev>`: copies from `.fake-vob/<name>/<rev>`,
/// or hangs when `<rev>.hang` sits beside it
const FAKE_CLEARTOOL: &str = r#"#!/bin/sh
if [ "$1" != "get" ] || [ "$2" != "-to" ]; then
  echo "cleartool: Error: Unrecognized command" >&2
  exit 1
fi
dest="$3"
name="${4%%@@*}"
rev=$(printf '%s' "${4#*@@}" | tr / _)
if [ -e "$dest" ]; then
  echo "cleartool: Error: \"$dest\" already exists" >&2
  exit 1
fi
src=".fake-vob/$name/$rev"
if [ ! -f "$src" ]; then
  echo "cleartool: Error: Unable to access \"$4\": No such file or directory." >&2
  exit 1
fi
if [ -f "$src.hang" ]; then
  echo "cleartool: waiting for view server" >&2
  exec sleep 30
fi
cp "$src" "$dest"
"#;

pub struct FakeTools {
    _dir: TempDir,
    pub sccs: PathBuf,
    pub cleartool: PathBuf,
}

pub fn write_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn fake_tools() -> &'static FakeTools {
    static TOOLS: OnceLock<FakeTools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = tempfile::Builder::new()
            .prefix("revget-fake-tools")
            .tempdir()
            .unwrap();
        let sccs = write_tool(dir.path(), "sccs", FAKE_SCCS);
        let cleartool = write_tool(dir.path(), "cleartool", FAKE_CLEARTOOL);
        FakeTools {
            _dir: dir,
            sccs,
            cleartool,
        }
    })
}

/// Service running the fake tools, with scratch directories under `scratch_root`
pub fn service(scratch_root: &Path) -> RevisionService {
    RevisionService::from_config(fake_tool_config(scratch_root))
}

/// Same as `service`, with every tool run bounded by `timeout_ms`
pub fn service_with_timeout(scratch_root: &Path, timeout_ms: u64) -> RevisionService {
    RevisionService::from_config(RetrievalConfig {
        timeout_ms: Some(timeout_ms),
        ..fake_tool_config(scratch_root)
    })
}

fn fake_tool_config(scratch_root: &Path) -> RetrievalConfig {
    let tools = fake_tools();
    RetrievalConfig {
        scratch_root: Some(scratch_root.to_string_lossy().into_owned()),
        tools: [
            (RepositoryType::Sccs, tools.sccs.to_string_lossy().into_owned()),
            (
                RepositoryType::ClearCase,
                tools.cleartool.to_string_lossy().into_owned(),
            ),
        ]
        .into_iter()
        .collect(),
        ..Default::default()
    }
}

/// The `note.txt` fixture: three deltas, each adding one line
pub fn note_archive() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("1.1", "This is a note.\n"),
        ("1.2", "This is a note.\nA second line was added.\n"),
        (
            "1.3",
            "This is a note.\nA second line was added.\nAnd a third, with CRLF.\r\n",
        ),
    ])
}

/// Write `s.<name>` holding `revisions`, plus the checked-out file at the newest one
pub fn write_sccs_history(dir: &Path, name: &str, revisions: &BTreeMap<&str, &str>) -> PathBuf {
    let mut history = String::new();
    for (rev, content) in revisions {
        history.push_str(&format!("@@rev {}\n{}", rev, content));
    }
    let history_path = dir.join(format!("s.{}", name));
    std::fs::write(&history_path, history).unwrap();

    if let Some(newest) = revisions.values().last() {
        std::fs::write(dir.join(name), newest).unwrap();
    }
    history_path
}

/// Store one ClearCase version for the fake cleartool
pub fn write_vob_version(view: &Path, name: &str, rev: &str, content: &[u8]) {
    let dir = view.join(".fake-vob").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(rev.replace('/', "_")), content).unwrap();
}

/// Make the fake cleartool hang instead of fetching this version
pub fn hang_vob_version(view: &Path, name: &str, rev: &str) {
    let dir = view.join(".fake-vob").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.hang", rev.replace('/', "_"))), b"").unwrap();
}

/// Every file under `dir` with its content, for before/after comparisons
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path.clone());
                files.insert(path, Vec::new());
            } else {
                let content = std::fs::read(&path).unwrap();
                files.insert(path, content);
            }
        }
    }
    files
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}
