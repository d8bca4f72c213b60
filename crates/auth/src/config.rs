//! Static configuration of the permission engine.

use serde::{Deserialize, Serialize};

use permscope_core::ScopeTypeName;

use crate::error::RegistryError;
use crate::roles::RoleId;

/// Names of the designated roles and the behavior switches of the resolver.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Scope type whose instances are security boundaries.
    pub boundary_scope_type: ScopeTypeName,

    /// Top-level role that bypasses every check in its boundary.
    pub admin_role: RoleId,

    /// Role whose operations make up the baseline read set.
    pub baseline_read_role: RoleId,

    /// Fallback role for unknown or revoked membership flags.
    pub no_access_role: RoleId,

    /// Marker role: defer to team roles at the boundary.
    pub low_priority_role: RoleId,

    /// Legacy membership flag stored for `member_alias_role`.
    pub member_flag: String,

    pub member_alias_role: RoleId,

    /// Reject context objects of the wrong scope type instead of logging them.
    pub strict_context_checks: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            boundary_scope_type: ScopeTypeName::new("group"),
            admin_role: RoleId::new("ADMIN"),
            baseline_read_role: RoleId::new("VIEWER"),
            no_access_role: RoleId::new("NO_ACCESS"),
            low_priority_role: RoleId::new("NO_ROLE_LOW_PRIORITY"),
            member_flag: "MEMBER".to_string(),
            member_alias_role: RoleId::new("BUILDER"),
            strict_context_checks: cfg!(debug_assertions),
        }
    }
}

impl PermissionsConfig {
    /// Load from `PERMSCOPE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, RegistryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RegistryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("PERMSCOPE_BOUNDARY_SCOPE_TYPE") {
            config.boundary_scope_type = ScopeTypeName::new(v);
        }
        if let Some(v) = lookup("PERMSCOPE_ADMIN_ROLE") {
            config.admin_role = RoleId::new(v);
        }
        if let Some(v) = lookup("PERMSCOPE_BASELINE_READ_ROLE") {
            config.baseline_read_role = RoleId::new(v);
        }
        if let Some(v) = lookup("PERMSCOPE_NO_ACCESS_ROLE") {
            config.no_access_role = RoleId::new(v);
        }
        if let Some(v) = lookup("PERMSCOPE_LOW_PRIORITY_ROLE") {
            config.low_priority_role = RoleId::new(v);
        }
        if let Some(v) = lookup("PERMSCOPE_MEMBER_FLAG") {
            config.member_flag = v;
        }
        if let Some(v) = lookup("PERMSCOPE_MEMBER_ALIAS_ROLE") {
            config.member_alias_role = RoleId::new(v);
        }
        if let Some(v) = lookup("PERMSCOPE_STRICT_CONTEXT_CHECKS") {
            config.strict_context_checks = parse_flag("PERMSCOPE_STRICT_CONTEXT_CHECKS", &v)?;
        }

        Ok(config)
    }

    /// Role named by a legacy membership flag.
    pub fn role_for_member_flag(&self, flag: &str) -> RoleId {
        if flag == self.member_flag {
            self.member_alias_role.clone()
        } else {
            RoleId::new(flag.to_string())
        }
    }

    /// Legacy membership flag persisted for a top-level role.
    pub fn member_flag_for_role(&self, role: &RoleId) -> String {
        if role == &self.member_alias_role {
            self.member_flag.clone()
        } else {
            role.as_str().to_string()
        }
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, RegistryError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RegistryError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let config = PermissionsConfig::from_lookup(|key| match key {
            "PERMSCOPE_ADMIN_ROLE" => Some("OWNER".to_string()),
            "PERMSCOPE_STRICT_CONTEXT_CHECKS" => Some("off".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.admin_role.as_str(), "OWNER");
        assert!(!config.strict_context_checks);
        assert_eq!(config.baseline_read_role.as_str(), "VIEWER");
    }

    #[test]
    fn membership_translation_is_configurable() {
        let config = PermissionsConfig::from_lookup(|key| match key {
            "PERMSCOPE_LOW_PRIORITY_ROLE" => Some("DEFERRED".to_string()),
            "PERMSCOPE_MEMBER_FLAG" => Some("STAFF".to_string()),
            "PERMSCOPE_MEMBER_ALIAS_ROLE" => Some("EDITOR".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.low_priority_role.as_str(), "DEFERRED");
        assert_eq!(config.role_for_member_flag("STAFF").as_str(), "EDITOR");
        assert_eq!(config.member_flag_for_role(&"EDITOR".into()), "STAFF");
        assert_eq!(config.role_for_member_flag("MEMBER").as_str(), "MEMBER");
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let err = PermissionsConfig::from_lookup(|key| {
            (key == "PERMSCOPE_STRICT_CONTEXT_CHECKS").then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn member_flag_maps_to_builder_and_back() {
        let config = PermissionsConfig::default();
        let role = config.role_for_member_flag("MEMBER");
        assert_eq!(role.as_str(), "BUILDER");
        assert_eq!(config.member_flag_for_role(&role), "MEMBER");
        assert_eq!(config.role_for_member_flag("ADMIN").as_str(), "ADMIN");
    }

    #[test]
    fn partial_document_uses_defaults() {
        let config: PermissionsConfig =
            serde_json::from_str(r#"{ "boundary_scope_type": "workspace" }"#).unwrap();
        assert_eq!(config.boundary_scope_type.as_str(), "workspace");
        assert_eq!(config.no_access_role.as_str(), "NO_ACCESS");
    }
}
