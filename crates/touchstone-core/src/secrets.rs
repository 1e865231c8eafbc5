use anyhow::Context;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

const PLACEHOLDER_PATTERN: &str = r"\$\{ENV:([A-Za-z_][A-Za-z0-9_]*)\}";

/// The outcome of resolving a step value. `had_secret` lets callers know
/// the resolved string must stay scoped to this one step invocation.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub value: String,
    pub had_secret: bool,
}

/// Resolves `${ENV:NAME}` placeholders at the interaction boundary.
///
/// Resolution is the only place a secret value ever materializes; step
/// templates are what get logged and persisted, never the output of
/// `resolve`.
#[derive(Clone)]
pub struct SecretResolver {
    lookup: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl SecretResolver {
    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        SecretResolver {
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Resolve from a fixed map. Test/replay use.
    pub fn fixed(values: HashMap<String, String>) -> Self {
        SecretResolver {
            lookup: Arc::new(move |name| values.get(name).cloned()),
        }
    }

    pub fn resolve(&self, template: &str) -> anyhow::Result<Resolved> {
        let re = Regex::new(PLACEHOLDER_PATTERN).context("invalid placeholder pattern")?;
        let mut captures = re.captures_iter(template);

        let Some(cap) = captures.next() else {
            return Ok(Resolved {
                value: template.to_string(),
                had_secret: false,
            });
        };
        if captures.next().is_some() {
            anyhow::bail!("step value contains more than one secret placeholder");
        }

        let name = &cap[1];
        let secret = (self.lookup)(name)
            .with_context(|| format!("secret '{}' is not set in the environment", name))?;
        let value = template.replacen(&cap[0], &secret, 1);
        Ok(Resolved {
            value,
            had_secret: true,
        })
    }
}
