//! The context node and its resolution chain.

use parking_lot::RwLock;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A function producing the current value of a bound token.
pub type ResolverFn = Arc<dyn Fn() -> String + Send + Sync>;

/// A strategy consulted for tokens that are not directly bound.
pub trait TokenResolver: Send + Sync {
    /// Resolves `token`, or returns `None` to let the next strategy try.
    fn resolve(&self, token: &str) -> Option<String>;

    /// Tokens this strategy knows up front.
    ///
    /// These are frozen by [`Context::cache_callbacks`]; tokens not listed
    /// keep resolving live.
    fn tokens(&self) -> Vec<String> {
        Vec::new()
    }
}

#[allow(clippy::expect_used)]
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid token pattern"))
}

/// One node of the template resolution chain.
///
/// Resolution order: frozen cache, direct bindings, resolver strategies in
/// registration order, then the parent node.
#[derive(Default)]
pub struct Context {
    bindings: RwLock<Vec<(String, ResolverFn)>>,
    resolvers: RwLock<Vec<Arc<dyn TokenResolver>>>,
    cache: RwLock<Option<HashMap<String, String>>>,
    parent: RwLock<Option<Arc<Context>>>,
}

impl Context {
    /// Creates an empty context with no parent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `token` to a resolver function.
    ///
    /// Rebinding an existing token replaces it in place.
    pub fn bind<F>(&self, token: impl Into<String>, resolver: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        let token = token.into();
        let resolver: ResolverFn = Arc::new(resolver);
        let mut bindings = self.bindings.write();
        if let Some(slot) = bindings.iter_mut().find(|(name, _)| *name == token) {
            slot.1 = resolver;
        } else {
            bindings.push((token, resolver));
        }
    }

    /// Binds `token` to a fixed value.
    pub fn bind_value(&self, token: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        self.bind(token, move || value.clone());
    }

    /// Appends a resolver strategy to the chain.
    pub fn add_resolver(&self, resolver: Arc<dyn TokenResolver>) {
        self.resolvers.write().push(resolver);
    }

    /// Sets the parent consulted when this node cannot resolve a token.
    pub fn set_parent(&self, parent: Arc<Context>) {
        *self.parent.write() = Some(parent);
    }

    /// Returns the parent node, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Context>> {
        self.parent.read().clone()
    }

    /// Returns the directly bound token names in binding order.
    #[must_use]
    pub fn bound_tokens(&self) -> Vec<String> {
        self.bindings.read().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Freezes the current value of every bound token and every token the
    /// resolver strategies list up front.
    ///
    /// Called once before a run; afterwards those tokens resolve to the
    /// frozen values even if their underlying state changes.
    pub fn cache_callbacks(&self) {
        let mut frozen = HashMap::new();
        for resolver in self.resolvers.read().iter() {
            for token in resolver.tokens() {
                if let Some(value) = resolver.resolve(&token) {
                    frozen.entry(token).or_insert(value);
                }
            }
        }
        for (token, resolver) in self.bindings.read().iter() {
            frozen.insert(token.clone(), resolver());
        }
        *self.cache.write() = Some(frozen);
    }

    /// Drops frozen values so tokens resolve live again.
    pub fn clear_cache(&self) {
        *self.cache.write() = None;
    }

    /// Returns whether values are currently frozen.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.read().is_some()
    }

    /// Resolves a single token (without the leading `$`).
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<String> {
        if let Some(value) = self.cache.read().as_ref().and_then(|c| c.get(token)) {
            return Some(value.clone());
        }

        let bound = self
            .bindings
            .read()
            .iter()
            .find(|(name, _)| name == token)
            .map(|(_, resolver)| resolver.clone());
        if let Some(resolver) = bound {
            return Some(resolver());
        }

        let resolvers: Vec<_> = self.resolvers.read().clone();
        if let Some(value) = resolvers.iter().find_map(|r| r.resolve(token)) {
            return Some(value);
        }

        self.parent().and_then(|parent| parent.resolve(token))
    }

    /// Expands every `$TOKEN` in `template`.
    ///
    /// Tokens that do not resolve are left as written.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        token_pattern()
            .replace_all(template, |caps: &Captures<'_>| {
                self.resolve(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bound_tokens", &self.bound_tokens())
            .field("resolvers", &self.resolvers.read().len())
            .field("cached", &self.is_cached())
            .field("has_parent", &self.parent.read().is_some())
            .finish()
    }
}
