//! Closed operation table for the file manager surface.
//!
//! A request names its operation with a `mode` string. Known names parse into
//! `Operation`; their parameters are pulled into a typed `Command`; `dispatch`
//! runs it against the namespace. An unknown name fails once, at parse time.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::namespace::Namespace;
use crate::paths;
use crate::storage::ChunkReader;
use crate::types::{DirEntry, EntryInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetInfo,
    GetFolder,
    Rename,
    Delete,
    AddFolder,
    Download,
    Resolve,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::GetInfo,
        Operation::GetFolder,
        Operation::Rename,
        Operation::Delete,
        Operation::AddFolder,
        Operation::Download,
        Operation::Resolve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetInfo => "getinfo",
            Operation::GetFolder => "getfolder",
            Operation::Rename => "rename",
            Operation::Delete => "delete",
            Operation::AddFolder => "addfolder",
            Operation::Download => "download",
            Operation::Resolve => "resolve",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Operation {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| FsError::invalid("unknown_operation", format!("Unknown operation '{}'", s)))
    }
}

/// An operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetInfo { path: String },
    GetFolder { path: String },
    Rename { old: String, new_name: String },
    Delete { path: String },
    AddFolder { parent: String, name: String },
    Download { path: String },
    Resolve { path: String },
}

fn param(params: &HashMap<String, String>, key: &str) -> FsResult<String> {
    params
        .get(key)
        .cloned()
        .ok_or_else(|| FsError::invalid("missing_parameter", format!("Missing parameter '{}'", key)))
}

impl Command {
    /// Build from request parameters; `mode` selects the operation.
    pub fn parse(params: &HashMap<String, String>) -> FsResult<Self> {
        let op: Operation = param(params, "mode")?.parse()?;
        Self::from_params(op, params)
    }

    pub fn from_params(op: Operation, params: &HashMap<String, String>) -> FsResult<Self> {
        Ok(match op {
            Operation::GetInfo => Command::GetInfo { path: param(params, "path")? },
            Operation::GetFolder => Command::GetFolder { path: param(params, "path")? },
            Operation::Rename => Command::Rename { old: param(params, "old")?, new_name: param(params, "new")? },
            Operation::Delete => Command::Delete { path: param(params, "path")? },
            Operation::AddFolder => Command::AddFolder { parent: param(params, "path")?, name: param(params, "name")? },
            Operation::Download => Command::Download { path: param(params, "path")? },
            Operation::Resolve => Command::Resolve { path: param(params, "path")? },
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Command::GetInfo { .. } => Operation::GetInfo,
            Command::GetFolder { .. } => Operation::GetFolder,
            Command::Rename { .. } => Operation::Rename,
            Command::Delete { .. } => Operation::Delete,
            Command::AddFolder { .. } => Operation::AddFolder,
            Command::Download { .. } => Operation::Download,
            Command::Resolve { .. } => Operation::Resolve,
        }
    }
}

/// Structured result of a non-streaming command.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Info { info: EntryInfo },
    Folder { path: String, entries: Vec<EntryInfo> },
    Renamed { old_path: String, old_name: String, new_path: String, new_name: String },
    Deleted { path: String },
    FolderAdded { parent: String, name: String, path: String },
    Resolved { entry: DirEntry },
}

#[derive(Debug)]
pub enum Outcome {
    Reply(Reply),
    Content { path: String, filename: String, content_type: Option<String>, reader: ChunkReader },
}

impl Outcome {
    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Outcome::Reply(r) => Some(r),
            Outcome::Content { .. } => None,
        }
    }
}

pub fn dispatch(ns: &Namespace, cmd: Command) -> FsResult<Outcome> {
    debug!(target: "docfs::command", "dispatch {} {:?}", cmd.operation(), cmd);
    let reply = match cmd {
        Command::GetInfo { path } => Reply::Info { info: ns.info(&path)? },
        Command::GetFolder { path } => {
            let entries = ns.list_children(&path)?.iter().map(|child| ns.info_of(child)).collect();
            Reply::Folder { path: paths::normalize(&path), entries }
        }
        Command::Rename { old, new_name } => {
            let entry = ns.resolve(&old)?;
            let old_path = entry.path();
            let old_name = entry.name().to_string();
            let new_path = ns.rename(&old_path, &new_name)?;
            let new_name = paths::base_name(&new_path).to_string();
            Reply::Renamed { old_path, old_name, new_path, new_name }
        }
        Command::Delete { path } => {
            let target = ns.resolve(&path)?.path();
            ns.delete(&target)?;
            Reply::Deleted { path: target }
        }
        Command::AddFolder { parent, name } => {
            let folder = ns.create_folder(&parent, &name)?;
            Reply::FolderAdded { parent: paths::parent_path(&folder.path), name, path: folder.path }
        }
        Command::Download { path } => {
            let entry = ns.resolve(&path)?;
            let reader = ns.read_content(&entry.path())?;
            let info = ns.info_of(&entry);
            return Ok(Outcome::Content { path: info.path, filename: info.name, content_type: info.content_type, reader });
        }
        Command::Resolve { path } => Reply::Resolved { entry: ns.resolve(&path)? },
    };
    Ok(Outcome::Reply(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::NamespaceConfig;
    use crate::storage::{MemoryContentStore, MemoryStore, StoreSettings};

    fn ns() -> Namespace {
        let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
        Namespace::open(store, Arc::new(MemoryContentStore::new("cmd")), NamespaceConfig::default()).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn run(ns: &Namespace, pairs: &[(&str, &str)]) -> FsResult<Reply> {
        let cmd = Command::parse(&params(pairs))?;
        Ok(dispatch(ns, cmd)?.into_reply().expect("reply"))
    }

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        let err = "getuploadpath".parse::<Operation>().unwrap_err();
        assert_eq!(err.code_str(), "unknown_operation");
    }

    #[test]
    fn missing_mode_or_param() {
        let ns = ns();
        assert_eq!(run(&ns, &[]).unwrap_err().code_str(), "missing_parameter");
        assert_eq!(run(&ns, &[("mode", "rename"), ("old", "/a")]).unwrap_err().code_str(), "missing_parameter");
        assert_eq!(run(&ns, &[("mode", "explode"), ("path", "/")]).unwrap_err().code_str(), "unknown_operation");
    }

    #[test]
    fn addfolder_getfolder_rename_delete() {
        let ns = ns();
        let added = run(&ns, &[("mode", "addfolder"), ("path", "/"), ("name", "pics")]).unwrap();
        assert_eq!(added, Reply::FolderAdded { parent: "/".into(), name: "pics".into(), path: "/pics".into() });
        ns.upload("/pics", "a.png", b"png", Some("image/png")).unwrap();

        match run(&ns, &[("mode", "getfolder"), ("path", "/pics/")]).unwrap() {
            Reply::Folder { path, entries } => {
                assert_eq!(path, "/pics");
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].size, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }

        match run(&ns, &[("mode", "rename"), ("old", "/pics/a.png"), ("new", "b.png")]).unwrap() {
            Reply::Renamed { old_path, old_name, new_path, new_name } => {
                assert_eq!((old_path.as_str(), old_name.as_str()), ("/pics/a.png", "a.png"));
                assert_eq!((new_path.as_str(), new_name.as_str()), ("/pics/b.png", "b.png"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = run(&ns, &[("mode", "delete"), ("path", "/pics")]).unwrap_err();
        assert!(matches!(err, FsError::NotEmpty { .. }));
        run(&ns, &[("mode", "delete"), ("path", "/pics/b.png")]).unwrap();
        assert_eq!(run(&ns, &[("mode", "delete"), ("path", "/pics")]).unwrap(), Reply::Deleted { path: "/pics".into() });
    }

    #[test]
    fn download_streams_content() {
        let ns = ns();
        ns.upload("/", "note.txt", b"hello world", Some("text/plain")).unwrap();
        let cmd = Command::parse(&params(&[("mode", "download"), ("path", "/note.txt")])).unwrap();
        match dispatch(&ns, cmd).unwrap() {
            Outcome::Content { filename, content_type, reader, .. } => {
                assert_eq!(filename, "note.txt");
                assert_eq!(content_type.as_deref(), Some("text/plain"));
                assert_eq!(reader.read_all().unwrap(), b"hello world");
            }
            other => panic!("unexpected {:?}", other),
        }
        let cmd = Command::parse(&params(&[("mode", "download"), ("path", "/")])).unwrap();
        assert_eq!(dispatch(&ns, cmd).unwrap_err().code_str(), "is_folder");
    }

    #[test]
    fn reply_serializes_with_tag() {
        let ns = ns();
        let reply = run(&ns, &[("mode", "resolve"), ("path", "/")]).unwrap();
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["reply"], "resolved");
        assert_eq!(v["entry"]["kind"], "folder");
        assert_eq!(v["entry"]["path"], "/");
    }
}
