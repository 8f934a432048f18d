#![forbid(unsafe_code)]

//! Versioned JPQL grammars.
//!
//! Every grammar owns three lookup tables (BNF rules, identifiers and
//! expression factories) and an optional base grammar. Lookups try the local
//! table first and then walk the base chain, so a grammar only needs to
//! describe what it adds (or hides) relative to the version it extends.

mod definitions;

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::GrammarError;

pub use definitions::bnf_ids;

/// JPA specification version targeted by a grammar.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum JpaVersion {
    /// JPA 1.0.
    V1_0,
    /// JPA 2.0.
    V2_0,
    /// JPA 2.1.
    V2_1,
}

impl fmt::Display for JpaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JpaVersion::V1_0 => write!(f, "1.0"),
            JpaVersion::V2_0 => write!(f, "2.0"),
            JpaVersion::V2_1 => write!(f, "2.1"),
        }
    }
}

/// Who defines the grammar: the JPA specification or a provider extending it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum Provider {
    /// Plain specification grammar.
    Jpa,
    /// EclipseLink provider grammar.
    EclipseLink,
}

/// The grammars shipped with the registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum GrammarKind {
    /// JPQL as defined by JPA 1.0.
    Jpql1_0,
    /// JPQL as defined by JPA 2.0.
    Jpql2_0,
    /// JPQL as defined by JPA 2.1.
    Jpql2_1,
    /// EclipseLink grammar for JPA 1.0.
    EclipseLink1_0,
    /// EclipseLink grammar for JPA 2.1.
    EclipseLink2_1,
}

impl GrammarKind {
    /// All shipped grammars, bases before the grammars extending them.
    pub const ALL: [GrammarKind; 5] = [
        GrammarKind::Jpql1_0,
        GrammarKind::Jpql2_0,
        GrammarKind::Jpql2_1,
        GrammarKind::EclipseLink1_0,
        GrammarKind::EclipseLink2_1,
    ];

    /// Stable name used on the command line and in config files.
    pub fn name(self) -> &'static str {
        match self {
            GrammarKind::Jpql1_0 => "jpql-1.0",
            GrammarKind::Jpql2_0 => "jpql-2.0",
            GrammarKind::Jpql2_1 => "jpql-2.1",
            GrammarKind::EclipseLink1_0 => "eclipselink-1.0",
            GrammarKind::EclipseLink2_1 => "eclipselink-2.1",
        }
    }

    /// Parses a grammar name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        GrammarKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

/// Role of a reserved JPQL identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum IdentifierRole {
    /// Starts a clause (`SELECT`, `WHERE`, `JOIN FETCH`, ...).
    Clause,
    /// Logical or comparison operator (`AND`, `BETWEEN`, `IS NULL`, ...).
    Operator,
    /// Function or aggregate name.
    Function,
    /// Literal keyword (`TRUE`, `NULL`, `CURRENT_DATE`).
    Literal,
    /// Any other reserved word (`AS`, `ASC`, `LEADING`, ...).
    Keyword,
}

/// Definition of one reserved identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct IdentifierInfo {
    /// Canonical upper-case spelling, words separated by one space.
    pub identifier: &'static str,
    /// Role of the identifier.
    pub role: IdentifierRole,
    /// Version that introduced it.
    pub since: JpaVersion,
}

/// Which expression an identifier creates when it starts an expression.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum ExpressionFactory {
    /// Fixed-arity scalar function (`ABS`, `CONCAT`, ...).
    Function,
    /// Aggregate function.
    Aggregate,
    /// `NEW class(...)`.
    Constructor,
    /// `TRIM([spec] [char] [FROM] str)`.
    Trim,
    /// `CURRENT_DATE` and friends.
    DateTime,
    /// `EXISTS (subquery)`.
    Exists,
    /// `ALL`, `ANY`, `SOME`.
    AllOrAny,
    /// `OBJECT(var)`.
    Object,
    /// `CASE ... END`.
    Case,
    /// `COALESCE(...)`.
    Coalesce,
    /// `NULLIF(a, b)`.
    NullIf,
    /// `KEY`, `VALUE`, `ENTRY`.
    MapEntry,
    /// `INDEX(var)`.
    Index,
    /// `TYPE(var)`.
    Type,
    /// `FUNCTION('name', ...)`.
    SqlFunction,
    /// `TREAT(path AS type)`.
    Treat,
}

/// Parser entry point selected by a BNF rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum EntryPoint {
    /// SELECT, UPDATE or DELETE statement.
    Statement,
    /// SELECT statement only.
    SelectStatement,
    /// UPDATE statement only.
    UpdateStatement,
    /// DELETE statement only.
    DeleteStatement,
    /// Parenthesised or bare subquery.
    Subquery,
    /// One select item.
    SelectExpression,
    /// Conditional expression.
    ConditionalExpression,
    /// Scalar (arithmetic, string, datetime) expression.
    ScalarExpression,
    /// `Entity [AS] var`.
    RangeVariableDeclaration,
    /// CASE expression.
    CaseExpression,
}

/// A named grammar production usable as a parse entry point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct BnfRule {
    /// Unique identifier.
    pub id: &'static str,
    /// Parser routine that handles it.
    pub entry: EntryPoint,
}

#[derive(Clone, Debug)]
enum Slot<T> {
    Defined(T),
    Excluded,
}

/// An immutable JPQL grammar.
pub struct Grammar {
    name: String,
    kind: Option<GrammarKind>,
    version: JpaVersion,
    provider: Provider,
    base: Option<Arc<Grammar>>,
    bnfs: FxHashMap<String, Slot<BnfRule>>,
    identifiers: FxHashMap<String, Slot<IdentifierInfo>>,
    factories: FxHashMap<String, Slot<ExpressionFactory>>,
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("provider", &self.provider)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Grammar {
    /// Grammar name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shipped kind, `None` for custom grammars.
    pub fn kind(&self) -> Option<GrammarKind> {
        self.kind
    }

    /// Targeted JPA version.
    pub fn version(&self) -> JpaVersion {
        self.version
    }

    /// Grammar provider.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The grammar this one extends.
    pub fn base(&self) -> Option<&Arc<Grammar>> {
        self.base.as_ref()
    }

    /// Names of this grammar and its bases, most specific first.
    pub fn chain(&self) -> Vec<&str> {
        let mut names = vec![self.name()];
        let mut current = self.base.as_deref();
        while let Some(grammar) = current {
            names.push(grammar.name());
            current = grammar.base.as_deref();
        }
        names
    }

    /// Whether an identification variable may follow `JOIN FETCH`.
    pub fn allows_join_fetch_variable(&self) -> bool {
        self.provider == Provider::EclipseLink
    }

    /// Looks up a BNF rule, walking the base chain.
    pub fn bnf(&self, id: &str) -> Result<&BnfRule, GrammarError> {
        lookup(self, |g| g.bnfs.get(id)).ok_or_else(|| GrammarError::UnknownBnf {
            id: id.to_string(),
            grammar: self.name.clone(),
        })
    }

    /// Looks up a reserved identifier (case-insensitive, single spaces).
    pub fn identifier(&self, identifier: &str) -> Option<&IdentifierInfo> {
        let key = normalize(identifier);
        lookup(self, |g| g.identifiers.get(&key))
    }

    /// Like [`Grammar::identifier`] but reports a missing entry as an error.
    pub fn require_identifier(&self, identifier: &str) -> Result<&IdentifierInfo, GrammarError> {
        self.identifier(identifier)
            .ok_or_else(|| GrammarError::UnknownIdentifier {
                identifier: normalize(identifier),
                grammar: self.name.clone(),
            })
    }

    /// Whether the identifier is defined.
    pub fn has_identifier(&self, identifier: &str) -> bool {
        self.identifier(identifier).is_some()
    }

    /// Expression factory registered for an identifier.
    pub fn expression_factory(&self, identifier: &str) -> Option<ExpressionFactory> {
        let key = normalize(identifier);
        lookup(self, |g| g.factories.get(&key)).copied()
    }

    /// All visible BNF ids, sorted.
    pub fn bnf_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        let mut current = Some(self);
        while let Some(grammar) = current {
            for (key, slot) in &grammar.bnfs {
                if seen.contains(&key.as_str()) {
                    continue;
                }
                seen.push(key);
                if let Slot::Defined(rule) = slot {
                    ids.push(rule.id);
                }
            }
            current = grammar.base.as_deref();
        }
        ids.sort_unstable();
        ids
    }

    /// All visible identifiers, sorted by spelling.
    pub fn identifiers(&self) -> Vec<&IdentifierInfo> {
        let mut infos: Vec<&IdentifierInfo> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        let mut current = Some(self);
        while let Some(grammar) = current {
            for (key, slot) in &grammar.identifiers {
                if seen.contains(&key.as_str()) {
                    continue;
                }
                seen.push(key);
                if let Slot::Defined(info) = slot {
                    infos.push(info);
                }
            }
            current = grammar.base.as_deref();
        }
        infos.sort_unstable_by_key(|info| info.identifier);
        infos
    }
}

fn lookup<'g, T>(
    grammar: &'g Grammar,
    table: impl Fn(&'g Grammar) -> Option<&'g Slot<T>>,
) -> Option<&'g T> {
    let mut current = Some(grammar);
    while let Some(g) = current {
        match table(g) {
            Some(Slot::Defined(value)) => return Some(value),
            Some(Slot::Excluded) => return None,
            None => current = g.base.as_deref(),
        }
    }
    None
}

fn normalize(identifier: &str) -> String {
    identifier
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds a grammar on top of an optional base.
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    /// Starts a custom grammar.
    pub fn new(name: impl Into<String>, version: JpaVersion, provider: Provider) -> Self {
        Self {
            grammar: Grammar {
                name: name.into(),
                kind: None,
                version,
                provider,
                base: None,
                bnfs: FxHashMap::default(),
                identifiers: FxHashMap::default(),
                factories: FxHashMap::default(),
            },
        }
    }

    /// Sets the base grammar consulted for undefined entries.
    pub fn base(mut self, base: Arc<Grammar>) -> Self {
        self.grammar.base = Some(base);
        self
    }

    fn kind(mut self, kind: GrammarKind) -> Self {
        self.grammar.kind = Some(kind);
        self
    }

    /// Registers a BNF rule.
    pub fn with_bnf(mut self, id: &'static str, entry: EntryPoint) -> Self {
        self.grammar
            .bnfs
            .insert(id.to_string(), Slot::Defined(BnfRule { id, entry }));
        self
    }

    /// Hides a BNF rule defined by the base chain.
    pub fn without_bnf(mut self, id: &str) -> Self {
        self.grammar.bnfs.insert(id.to_string(), Slot::Excluded);
        self
    }

    /// Registers an identifier.
    pub fn with_identifier(mut self, identifier: &'static str, role: IdentifierRole) -> Self {
        let since = self.grammar.version;
        self.grammar.identifiers.insert(
            normalize(identifier),
            Slot::Defined(IdentifierInfo {
                identifier,
                role,
                since,
            }),
        );
        self
    }

    /// Hides an identifier defined by the base chain.
    pub fn without_identifier(mut self, identifier: &str) -> Self {
        self.grammar
            .identifiers
            .insert(normalize(identifier), Slot::Excluded);
        self
    }

    /// Registers an expression factory for an identifier.
    pub fn with_factory(mut self, identifier: &str, factory: ExpressionFactory) -> Self {
        self.grammar
            .factories
            .insert(normalize(identifier), Slot::Defined(factory));
        self
    }

    /// Hides an expression factory defined by the base chain.
    pub fn without_factory(mut self, identifier: &str) -> Self {
        self.grammar
            .factories
            .insert(normalize(identifier), Slot::Excluded);
        self
    }

    /// Finishes the grammar.
    pub fn build(self) -> Arc<Grammar> {
        Arc::new(self.grammar)
    }
}

/// Process-wide set of shipped grammars, built once and handed out by handle.
#[derive(Debug, Clone)]
pub struct GrammarRegistry {
    grammars: Vec<Arc<Grammar>>,
}

impl GrammarRegistry {
    /// Builds every shipped grammar.
    pub fn new() -> Self {
        let jpql1 = definitions::jpql_1_0(GrammarBuilder::new(
            GrammarKind::Jpql1_0.name(),
            JpaVersion::V1_0,
            Provider::Jpa,
        )
        .kind(GrammarKind::Jpql1_0))
        .build();
        let jpql2 = definitions::jpql_2_0(
            GrammarBuilder::new(GrammarKind::Jpql2_0.name(), JpaVersion::V2_0, Provider::Jpa)
                .kind(GrammarKind::Jpql2_0)
                .base(Arc::clone(&jpql1)),
        )
        .build();
        let jpql21 = definitions::jpql_2_1(
            GrammarBuilder::new(GrammarKind::Jpql2_1.name(), JpaVersion::V2_1, Provider::Jpa)
                .kind(GrammarKind::Jpql2_1)
                .base(Arc::clone(&jpql2)),
        )
        .build();
        // EclipseLink 1.0 adds nothing of its own.
        let eclipselink1 = GrammarBuilder::new(
            GrammarKind::EclipseLink1_0.name(),
            JpaVersion::V1_0,
            Provider::EclipseLink,
        )
        .kind(GrammarKind::EclipseLink1_0)
        .base(Arc::clone(&jpql1))
        .build();
        let eclipselink21 = GrammarBuilder::new(
            GrammarKind::EclipseLink2_1.name(),
            JpaVersion::V2_1,
            Provider::EclipseLink,
        )
        .kind(GrammarKind::EclipseLink2_1)
        .base(Arc::clone(&jpql21))
        .build();
        Self {
            grammars: vec![jpql1, jpql2, jpql21, eclipselink1, eclipselink21],
        }
    }

    /// Handle to a shipped grammar.
    pub fn get(&self, kind: GrammarKind) -> Arc<Grammar> {
        let idx = GrammarKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        Arc::clone(&self.grammars[idx])
    }

    /// Handle to a shipped grammar by name.
    pub fn by_name(&self, name: &str) -> Result<Arc<Grammar>, GrammarError> {
        GrammarKind::from_name(name)
            .map(|kind| self.get(kind))
            .ok_or_else(|| GrammarError::UnknownGrammar(name.to_string()))
    }

    /// Latest specification grammar.
    pub fn latest(&self) -> Arc<Grammar> {
        self.get(GrammarKind::Jpql2_1)
    }

    /// Iterates the shipped grammars.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Grammar>> {
        self.grammars.iter()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_fall_back_to_base() {
        let registry = GrammarRegistry::new();
        let jpql21 = registry.get(GrammarKind::Jpql2_1);
        assert!(jpql21.has_identifier("select"));
        assert!(jpql21.has_identifier("coalesce"));
        assert!(jpql21.has_identifier("on"));
        assert_eq!(jpql21.chain(), vec!["jpql-2.1", "jpql-2.0", "jpql-1.0"]);

        let jpql1 = registry.get(GrammarKind::Jpql1_0);
        assert!(!jpql1.has_identifier("CASE"));
        assert_eq!(jpql1.expression_factory("coalesce"), None);
        assert_eq!(
            jpql21.expression_factory("Coalesce"),
            Some(ExpressionFactory::Coalesce)
        );
    }

    #[test]
    fn unknown_bnf_names_id_and_grammar() {
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql1_0);
        let err = grammar.bnf("case_expression").unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnknownBnf {
                id: "case_expression".into(),
                grammar: "jpql-1.0".into(),
            }
        );
        assert!(registry
            .get(GrammarKind::Jpql2_0)
            .bnf(bnf_ids::CASE_EXPRESSION)
            .is_ok());
    }

    #[test]
    fn eclipselink_delegates_everything() {
        let registry = GrammarRegistry::new();
        let base = registry.get(GrammarKind::Jpql1_0);
        let eclipselink = registry.get(GrammarKind::EclipseLink1_0);
        assert_eq!(base.bnf_ids(), eclipselink.bnf_ids());
        assert!(eclipselink.allows_join_fetch_variable());
        assert!(!base.allows_join_fetch_variable());
    }

    #[test]
    fn exclusions_hide_base_entries() {
        let registry = GrammarRegistry::new();
        let restricted = GrammarBuilder::new("restricted", JpaVersion::V2_0, Provider::Jpa)
            .base(registry.get(GrammarKind::Jpql2_0))
            .without_identifier("join  fetch")
            .build();
        assert!(!restricted.has_identifier("JOIN FETCH"));
        assert!(restricted.has_identifier("JOIN"));
        assert!(matches!(
            restricted.require_identifier("join fetch"),
            Err(GrammarError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn names_round_trip() {
        for kind in GrammarKind::ALL {
            assert_eq!(GrammarKind::from_name(kind.name()), Some(kind));
        }
        let registry = GrammarRegistry::default();
        assert!(registry.by_name("jpql-3.0").is_err());
    }
}
