use std::collections::HashMap;

/// Which side of the pipeline a store is acting as. The source bucket is
/// read-only CDA export data; the target bucket holds the synthesised
/// Delta log (and may be the same physical store as the source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Source,
    Target,
}

impl Role {
    fn prefix(self) -> &'static str {
        match self {
            Role::Source => "CDA_SOURCE_",
            Role::Target => "CDA_TARGET_",
        }
    }
}

/// Per-role credential bag, resolved from the process environment.
///
/// Lookup order for a given suffix (e.g. `ACCESS_KEY_ID`): the
/// role-prefixed variable (`CDA_SOURCE_ACCESS_KEY_ID`) overrides the
/// generic one (`CDA_ACCESS_KEY_ID`). Neither present means the
/// downstream object-store builder falls back to its own `from_env`
/// discovery (e.g. the standard `AWS_*` variables).
#[derive(Debug, Clone, Default)]
pub struct RoleCredentials {
    pub values: HashMap<String, String>,
}

impl RoleCredentials {
    pub fn resolve(role: Role) -> Self {
        Self::resolve_from(role, &std::env::vars().collect())
    }

    /// Testable variant that resolves against an explicit environment map
    /// instead of the real process environment.
    pub fn resolve_from(role: Role, env: &HashMap<String, String>) -> Self {
        const SUFFIXES: &[&str] = &[
            "ACCESS_KEY_ID",
            "SECRET_ACCESS_KEY",
            "SESSION_TOKEN",
            "REGION",
            "PROFILE",
            "ROLE_ARN",
            "ACCOUNT_NAME",
            "ACCOUNT_KEY",
            "SAS_TOKEN",
            "TENANT_ID",
            "CLIENT_ID",
            "CLIENT_SECRET",
        ];
        let mut values = HashMap::new();
        for suffix in SUFFIXES {
            let scoped = format!("{}{}", role.prefix(), suffix);
            let generic = format!("CDA_{suffix}");
            if let Some(v) = env.get(&scoped).or_else(|| env.get(&generic)) {
                values.insert((*suffix).to_string(), v.clone());
            }
        }
        Self { values }
    }

    pub fn get(&self, suffix: &str) -> Option<&str> {
        self.values.get(suffix).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_prefixed_overrides_generic() {
        let mut env = HashMap::new();
        env.insert("CDA_REGION".to_string(), "us-east-1".to_string());
        env.insert("CDA_SOURCE_REGION".to_string(), "eu-west-1".to_string());
        let creds = RoleCredentials::resolve_from(Role::Source, &env);
        assert_eq!(creds.get("REGION"), Some("eu-west-1"));

        let target_creds = RoleCredentials::resolve_from(Role::Target, &env);
        assert_eq!(target_creds.get("REGION"), Some("us-east-1"));
    }

    #[test]
    fn missing_suffix_is_absent() {
        let env = HashMap::new();
        let creds = RoleCredentials::resolve_from(Role::Source, &env);
        assert_eq!(creds.get("ACCESS_KEY_ID"), None);
    }
}
