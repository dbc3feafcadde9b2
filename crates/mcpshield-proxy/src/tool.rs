//! Tool entries, the public-name grammar, and the per-server registry.
//!
//! Public names follow `ms_<server>_<tool>`. The decoder splits on the first
//! underscore after the prefix, which is why server names may not contain
//! underscores (enforced at config load). Tool definitions are kept verbatim
//! as returned by the upstream; only the `name` field is rewritten on the way
//! out.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Prefix of every public tool name.
pub const PUBLIC_NAME_PREFIX: &str = "ms_";

/// One tool owned by one upstream.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    server: String,
    original_name: String,
    definition: Map<String, Value>,
}

impl ToolEntry {
    /// Wrap an upstream tool object.
    pub fn new(
        server: impl Into<String>,
        original_name: impl Into<String>,
        definition: Map<String, Value>,
    ) -> Self {
        Self {
            server: server.into(),
            original_name: original_name.into(),
            definition,
        }
    }

    /// Owning upstream name.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Name the upstream knows this tool by.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Namespaced name exposed to clients.
    pub fn public_name(&self) -> String {
        format!("{PUBLIC_NAME_PREFIX}{}_{}", self.server, self.original_name)
    }

    /// Registry key, unique per (server, tool).
    fn key(&self) -> String {
        format!("{}:{}", self.server, self.original_name)
    }

    /// Copy of the upstream definition with the `name` field rewritten to the
    /// public name.
    pub fn public_definition(&self) -> Value {
        let mut definition = self.definition.clone();
        definition.insert("name".to_string(), Value::String(self.public_name()));
        Value::Object(definition)
    }
}

/// Decode a public name into `(server, original)`.
pub fn parse_public_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(PUBLIC_NAME_PREFIX)?;
    let (server, original) = rest.split_once('_')?;
    if server.is_empty() || original.is_empty() {
        return None;
    }
    Some((server, original))
}

/// Per-server tool index. Refreshes take the write side; `list` and `find`
/// take the read side, so lookups stay available during a refresh.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolEntry>>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tool. Within one refresh the later entry wins for
    /// a repeated original name.
    pub async fn update(&self, entry: ToolEntry) {
        self.tools.write().await.insert(entry.key(), entry);
    }

    /// Public definitions, sorted by public name for a stable snapshot.
    pub async fn list(&self) -> Vec<Value> {
        let tools = self.tools.read().await;
        let mut entries: Vec<&ToolEntry> = tools.values().collect();
        entries.sort_by_key(|e| e.public_name());
        entries.iter().map(|e| e.public_definition()).collect()
    }

    /// All entries, sorted by public name.
    pub async fn entries(&self) -> Vec<ToolEntry> {
        let tools = self.tools.read().await;
        let mut entries: Vec<ToolEntry> = tools.values().cloned().collect();
        entries.sort_by_key(ToolEntry::public_name);
        entries
    }

    /// Find the entry whose public name matches.
    pub async fn find(&self, public_name: &str) -> Option<ToolEntry> {
        self.tools
            .read()
            .await
            .values()
            .find(|e| e.public_name() == public_name)
            .cloned()
    }

    /// Number of registered tools.
    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Whether the registry has no tools.
    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(name: &str, description: &str) -> Map<String, Value> {
        json!({ "name": name, "description": description })
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn public_name_round_trips() {
        let entry = ToolEntry::new("beta", "lookup", definition("lookup", "l"));
        assert_eq!(entry.public_name(), "ms_beta_lookup");
        assert_eq!(
            parse_public_name(&entry.public_name()),
            Some(("beta", "lookup"))
        );
    }

    #[test]
    fn public_name_splits_on_first_underscore() {
        // The tool side may contain underscores; the server side cannot.
        assert_eq!(
            parse_public_name("ms_alpha_deep_search"),
            Some(("alpha", "deep_search"))
        );
    }

    #[test]
    fn parse_rejects_malformed_names() {
        assert_eq!(parse_public_name("lookup"), None);
        assert_eq!(parse_public_name("ms_nodelimiter"), None);
        assert_eq!(parse_public_name("ms__tool"), None);
        assert_eq!(parse_public_name("ms_server_"), None);
    }

    #[test]
    fn public_names_injective_across_servers() {
        let pairs = [
            ("alpha", "search"),
            ("alpha", "lookup"),
            ("beta", "search"),
            ("beta", "lookup"),
            ("a", "b-search"),
        ];
        let mut names: Vec<String> = pairs
            .iter()
            .map(|(s, t)| ToolEntry::new(*s, *t, Map::new()).public_name())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), pairs.len());
    }

    #[tokio::test]
    async fn registry_later_update_wins() {
        let registry = ToolRegistry::new();
        registry
            .update(ToolEntry::new("alpha", "search", definition("search", "old")))
            .await;
        registry
            .update(ToolEntry::new("alpha", "search", definition("search", "new")))
            .await;

        assert_eq!(registry.len().await, 1);
        let listed = registry.list().await;
        assert_eq!(listed[0]["description"], json!("new"));
    }

    #[tokio::test]
    async fn list_rewrites_name_and_sorts() {
        let registry = ToolRegistry::new();
        registry
            .update(ToolEntry::new("alpha", "zeta", definition("zeta", "z")))
            .await;
        registry
            .update(ToolEntry::new("alpha", "search", definition("search", "s")))
            .await;

        let listed = registry.list().await;
        assert_eq!(listed[0]["name"], json!("ms_alpha_search"));
        assert_eq!(listed[1]["name"], json!("ms_alpha_zeta"));
        // Other fields are copied through untouched.
        assert_eq!(listed[0]["description"], json!("s"));
    }

    #[tokio::test]
    async fn find_matches_public_name_only() {
        let registry = ToolRegistry::new();
        registry
            .update(ToolEntry::new("alpha", "search", definition("search", "s")))
            .await;

        assert!(registry.find("ms_alpha_search").await.is_some());
        assert!(registry.find("search").await.is_none());
        assert!(registry.find("ms_beta_search").await.is_none());
    }
}
