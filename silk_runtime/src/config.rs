//! Parsed configuration consumed by the runtime. Loading and file formats
//! are the host's concern; every field defaults so partial documents
//! deserialize.

use std::path::PathBuf;

use serde::Deserialize;

use crate::permissions::{NamespaceGrant, PermissionPolicy};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub permissions: PermissionsConfig,
    pub mode_a: ModeAConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PermissionsConfig {
    pub allow_commands: Vec<String>,
    pub deny_commands: Vec<String>,
    pub fs: FsPermissionsConfig,
    pub shell: ShellPermissionsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FsPermissionsConfig {
    pub read_roots: Vec<String>,
    pub write_roots: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellPermissionsConfig {
    pub allow_programs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModeAConfig {
    pub enabled: bool,
    pub argv: Vec<String>,
}

impl PermissionsConfig {
    /// Build the active policy. A non-empty `allow_commands` replaces the
    /// baseline allow data wholesale: entries with a `:` become exact
    /// allows, bare entries become namespace grants.
    pub fn to_policy(&self) -> PermissionPolicy {
        let mut policy = if self.allow_commands.is_empty() {
            PermissionPolicy::baseline()
        } else {
            let mut policy = PermissionPolicy::deny_all();
            for entry in &self.allow_commands {
                if entry.contains(':') {
                    policy.allow_command(entry.clone());
                } else {
                    policy.grant_namespace(entry.clone(), NamespaceGrant::default());
                }
            }
            policy
        };

        for entry in &self.deny_commands {
            policy.deny_command(entry.clone());
        }
        policy.set_fs_read_roots(self.fs.read_roots.iter().map(PathBuf::from).collect());
        policy.set_fs_write_roots(self.fs.write_roots.iter().map(PathBuf::from).collect());
        policy.set_shell_allow_programs(self.shell.allow_programs.iter().cloned().collect());
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PathAccess;
    use std::path::Path;

    #[test]
    fn empty_document_parses_to_defaults() {
        let config: RuntimeConfig = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(config, RuntimeConfig::default());
        assert!(!config.mode_a.enabled);
        assert_eq!(config.permissions.to_policy(), PermissionPolicy::baseline());
    }

    #[test]
    fn allow_commands_replace_the_baseline() {
        let config: PermissionsConfig =
            serde_json::from_str(r#"{"allow_commands": ["ts:echo", "custom"]}"#)
                .expect("parse permissions");
        let policy = config.to_policy();
        assert!(policy.allows("ts:echo"));
        assert!(policy.allows("custom:anything"));
        assert!(!policy.allows("silk:ping"));
        assert!(!policy.allows("fs:readText"));
    }

    #[test]
    fn deny_commands_extend_the_baseline() {
        let config: PermissionsConfig =
            serde_json::from_str(r#"{"deny_commands": ["fs:readText"]}"#).expect("parse");
        let policy = config.to_policy();
        assert!(!policy.allows("fs:readText"));
        assert!(policy.allows("fs:writeText"));
        assert!(policy.allows("silk:ping"));
    }

    #[test]
    fn fs_and_shell_blocks_are_recognized() {
        let raw = r#"{
            "permissions": {
                "fs": {"read_roots": ["/srv/app"], "write_roots": []},
                "shell": {"allow_programs": ["open"]}
            },
            "mode_a": {"enabled": true, "argv": ["deno", "run", "host.ts"]}
        }"#;
        let config: RuntimeConfig = serde_json::from_str(raw).expect("parse full config");
        assert!(config.mode_a.enabled);
        assert_eq!(config.mode_a.argv.len(), 3);

        let policy = config.permissions.to_policy();
        assert!(policy.allows_path(Path::new("/srv/app/x"), PathAccess::Read));
        assert!(!policy.allows_path(Path::new("/etc"), PathAccess::Read));
        assert!(policy.allows_path(Path::new("/etc"), PathAccess::Write));
        assert!(policy.allows_program("open"));
        assert!(!policy.allows_program("rm"));
    }
}
