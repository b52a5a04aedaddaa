//! Permission policy: flat allow/deny sets, namespace-scoped grants, and
//! filesystem/program scoping. Immutable after load; every predicate is a
//! pure lookup plus lexical path containment.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAccess {
    Read,
    Write,
}

/// A grant keyed by a bare namespace (`fs`), permitting any `fs:*`
/// identifier unless a sub-command restriction list is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceGrant {
    pub commands: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
    grants: BTreeMap<String, NamespaceGrant>,
    fs_read_roots: Vec<PathBuf>,
    fs_write_roots: Vec<PathBuf>,
    shell_allow_programs: BTreeSet<String>,
}

impl PermissionPolicy {
    /// The seeded default. The allow data covers the built-in command set
    /// and is replaced wholesale when configuration provides its own list.
    pub fn baseline() -> Self {
        let mut allow = BTreeSet::new();
        allow.insert("silk:ping".to_string());
        allow.insert("silk:appInfo".to_string());

        let mut grants = BTreeMap::new();
        for namespace in ["fs", "clipboard", "dialog", "shell", "window", "app"] {
            grants.insert(namespace.to_string(), NamespaceGrant::default());
        }

        Self {
            allow,
            deny: BTreeSet::new(),
            grants,
            fs_read_roots: Vec::new(),
            fs_write_roots: Vec::new(),
            shell_allow_programs: BTreeSet::new(),
        }
    }

    /// An empty policy that denies every command. Test seam.
    pub fn deny_all() -> Self {
        Self {
            allow: BTreeSet::new(),
            deny: BTreeSet::new(),
            grants: BTreeMap::new(),
            fs_read_roots: Vec::new(),
            fs_write_roots: Vec::new(),
            shell_allow_programs: BTreeSet::new(),
        }
    }

    pub fn allow_command(&mut self, id: impl Into<String>) {
        self.allow.insert(id.into());
    }

    pub fn deny_command(&mut self, id: impl Into<String>) {
        self.deny.insert(id.into());
    }

    pub fn grant_namespace(&mut self, namespace: impl Into<String>, grant: NamespaceGrant) {
        self.grants.insert(namespace.into(), grant);
    }

    pub fn set_fs_read_roots(&mut self, roots: Vec<PathBuf>) {
        self.fs_read_roots = roots;
    }

    pub fn set_fs_write_roots(&mut self, roots: Vec<PathBuf>) {
        self.fs_write_roots = roots;
    }

    pub fn set_shell_allow_programs(&mut self, programs: BTreeSet<String>) {
        self.shell_allow_programs = programs;
    }

    /// Whether the identifier is permitted. Deny wins over everything;
    /// then an exact allow match; then the namespace grant up to the
    /// first `:` separator.
    pub fn allows(&self, id: &str) -> bool {
        if self.deny.contains(id) {
            return false;
        }

        if self.allow.contains(id) {
            return true;
        }

        if let Some((namespace, sub)) = id.split_once(':') {
            if self.deny.contains(namespace) {
                return false;
            }
            if let Some(grant) = self.grants.get(namespace) {
                return match &grant.commands {
                    None => true,
                    Some(commands) => commands.contains(sub),
                };
            }
        }

        false
    }

    /// Whether `path` is inside one of the configured roots for the given
    /// access kind. An empty roots list permits everything. Containment is
    /// lexical: both sides are absolutized and dot-normalized, and the
    /// match boundary is a whole path component, so `/foo` never admits
    /// `/foobar`.
    pub fn allows_path(&self, path: &Path, access: PathAccess) -> bool {
        let roots = match access {
            PathAccess::Read => &self.fs_read_roots,
            PathAccess::Write => &self.fs_write_roots,
        };

        if roots.is_empty() {
            return true;
        }

        let resolved = resolve(path);
        roots.iter().any(|root| resolved.starts_with(resolve(root)))
    }

    /// Whether the program name is permitted. An empty set means any
    /// program the command-level allow list already admitted.
    pub fn allows_program(&self, name: &str) -> bool {
        self.shell_allow_programs.is_empty() || self.shell_allow_programs.contains(name)
    }
}

/// Map a route's permission key and the invoked identifier to the
/// canonical permission identifier looked up in the policy. A key that
/// already names an exact command is used as-is; a bare namespace key is
/// combined with the invoked sub-command (the segment after the last
/// `/` or `:`), so a route keyed `fs` invoked as `silk:fs/readText`
/// resolves to `fs:readText`.
pub fn permission_id(key: &str, cmd: &str) -> String {
    if key.contains(':') {
        return key.to_string();
    }

    let sub = cmd.rsplit(['/', ':']).next().unwrap_or(cmd);
    format!("{key}:{sub}")
}

fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    normalize_dot_segments(&absolute)
}

fn normalize_dot_segments(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut normals: Vec<std::ffi::OsString> = Vec::new();
    let mut rooted = false;

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                out.push(prefix.as_os_str());
                rooted = true;
            }
            Component::RootDir => {
                out.push(component.as_os_str());
                rooted = true;
            }
            Component::CurDir => {}
            Component::ParentDir => match normals.last() {
                Some(last) if last.as_os_str() != OsStr::new("..") => {
                    normals.pop();
                }
                _ => {
                    if !rooted {
                        normals.push("..".into());
                    }
                }
            },
            Component::Normal(part) => normals.push(part.to_os_string()),
        }
    }

    for part in normals {
        out.push(part);
    }

    out
}
