//! Semantic checks over a resolved query.

use tracing::debug;

use crate::diagnostic::{Diagnostic, DiagnosticKey};
use crate::parser::{Expression, ExpressionKind as K};
use crate::query::context::{QueryContext, ScopeId};
use crate::query::metadata::{Mapping, MappingKind, TypeKind};
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};

/// Coarse type of a scalar or entity expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCategory {
    /// Character data.
    String,
    /// Any numeric type.
    Numeric,
    /// `boolean`.
    Boolean,
    /// Dates, times and timestamps.
    Temporal,
    /// Entity or embeddable, by class name.
    Entity(String),
    /// Enum, by class name.
    Enum(String),
}

impl TypeCategory {
    fn label(&self) -> &str {
        match self {
            TypeCategory::String => "string",
            TypeCategory::Numeric => "numeric",
            TypeCategory::Boolean => "boolean",
            TypeCategory::Temporal => "temporal",
            TypeCategory::Entity(name) | TypeCategory::Enum(name) => name,
        }
    }
}

const STRING_TYPES: &[&str] = &["String", "char", "Character", "char[]", "Character[]"];
const NUMERIC_TYPES: &[&str] = &[
    "byte",
    "Byte",
    "short",
    "Short",
    "int",
    "Integer",
    "long",
    "Long",
    "float",
    "Float",
    "double",
    "Double",
    "BigDecimal",
    "BigInteger",
];
const BOOLEAN_TYPES: &[&str] = &["boolean", "Boolean"];
const TEMPORAL_TYPES: &[&str] = &[
    "Date",
    "Calendar",
    "Time",
    "Timestamp",
    "LocalDate",
    "LocalTime",
    "LocalDateTime",
    "OffsetTime",
    "OffsetDateTime",
    "Instant",
];

/// Semantic validator.
pub struct SemanticValidator<'c, 'p> {
    context: &'c QueryContext<'p>,
}

impl<'c, 'p> SemanticValidator<'c, 'p> {
    /// Validator over a built context.
    pub fn new(context: &'c QueryContext<'p>) -> Self {
        Self { context }
    }

    /// Runs every check; diagnostics come out in pre-order.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let Some(expression) = self.context.expression() else {
            return Vec::new();
        };
        let timer = profile_timer();
        let mut out = Vec::new();
        self.visit(expression.root(), ScopeId::ROOT, &mut out);
        record_profile_timer(QueryProfileKind::SemanticValidation, timer);
        debug!(diagnostics = out.len(), "validation.semantic.completed");
        out
    }

    fn visit(&self, node: &Expression, scope: ScopeId, out: &mut Vec<Diagnostic>) {
        let mut scope = scope;
        match &node.kind {
            K::Subquery { .. } => scope = self.context.scope_for(node.span),
            K::RangeDeclaration {
                entity,
                variable,
                joins,
                ..
            } => {
                if let K::AbstractSchemaName { name } = &entity.kind {
                    if self.context.provider().entity(name).is_none() {
                        out.push(Diagnostic::error(
                            entity.span,
                            DiagnosticKey::AbstractSchemaNameUnknown,
                            format!("entity '{name}' is unknown"),
                        ));
                    }
                }
                self.check_duplicate(variable.as_deref(), out);
                for join in joins {
                    self.visit(join, scope, out);
                }
                return;
            }
            K::DerivedDeclaration {
                path,
                variable,
                joins,
                ..
            } => {
                self.check_declaration_path(path, scope, false, out);
                self.check_duplicate(variable.as_deref(), out);
                for join in joins {
                    self.visit(join, scope, out);
                }
                return;
            }
            K::CollectionMemberDeclaration { path, variable, .. } => {
                self.check_declaration_path(path, scope, true, out);
                self.check_duplicate(variable.as_deref(), out);
                return;
            }
            K::Join {
                path, variable, on, ..
            } => {
                if self.context.rejected_join_fetches().contains(&node.span) {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::JoinFetchNotInRangeDeclaration,
                        "JOIN FETCH is only allowed on a range declaration",
                    ));
                }
                self.check_declaration_path(path, scope, false, out);
                self.check_duplicate(variable.as_deref(), out);
                if let Some(on) = on {
                    self.visit(on, scope, out);
                }
                return;
            }
            K::UpdateItem { path, value } => {
                if !matches!(path.kind, K::IdentificationVariable { .. }) {
                    self.visit(path, scope, out);
                }
                self.visit(value, scope, out);
                return;
            }
            K::IdentificationVariable { name } => {
                if self.context.resolver_in(scope, name).is_none()
                    && !self.context.is_result_variable(name)
                {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::IdentificationVariableNotDeclared,
                        format!("identification variable '{name}' is not declared"),
                    ));
                }
            }
            K::Path {
                collection_valued, ..
            } => {
                if let Some(mapping) = self.check_path(node, scope, out) {
                    self.check_usage(node, &mapping, *collection_valued, out);
                }
            }
            K::EntityTypeLiteral { name } => {
                if self.context.provider().entity(name).is_none() {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::EntityTypeLiteralUnknown,
                        format!("entity type '{name}' is unknown"),
                    ));
                }
            }
            K::Constructor { class_name, .. } => {
                if !self.context.provider().type_exists(class_name) {
                    out.push(Diagnostic::error(
                        node.span,
                        DiagnosticKey::ConstructorClassUnknown,
                        format!("class '{class_name}' is unknown"),
                    ));
                }
            }
            K::Binary { op, left, right } if op.is_comparison() => {
                self.check_comparable(node, left, right, scope, out);
            }
            K::Binary { op, left, right } if op.is_arithmetic() => {
                for operand in [left, right] {
                    self.check_numeric(operand, scope, out);
                }
            }
            K::Unary { operand, .. } => self.check_numeric(operand, scope, out),
            K::Between {
                expression,
                lower,
                upper,
                ..
            } => {
                self.check_comparable(node, expression, lower, scope, out);
                self.check_comparable(node, expression, upper, scope, out);
            }
            K::In {
                expression, items, ..
            } => {
                for item in items {
                    if !matches!(item.kind, K::Subquery { .. }) {
                        self.check_comparable(node, expression, item, scope, out);
                    }
                }
            }
            K::Like {
                expression,
                pattern,
                ..
            } => {
                for operand in [expression, pattern] {
                    if let Some(category) = self.category(operand, scope) {
                        if category != TypeCategory::String {
                            out.push(Diagnostic::error(
                                operand.span,
                                DiagnosticKey::LikeRequiresString,
                                format!("LIKE requires a string operand, found {}", category.label()),
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
        for child in node.children() {
            self.visit(child, scope, out);
        }
    }

    fn check_duplicate(&self, variable: Option<&Expression>, out: &mut Vec<Diagnostic>) {
        let Some(variable) = variable else {
            return;
        };
        if let Some(duplicate) = self
            .context
            .duplicate_variables()
            .iter()
            .find(|d| d.span == variable.span)
        {
            out.push(Diagnostic::error(
                variable.span,
                DiagnosticKey::IdentificationVariableDuplicate,
                format!("identification variable '{}' is declared twice", duplicate.name),
            ));
        }
    }

    /// Paths in FROM must end on a relationship or a collection.
    fn check_declaration_path(
        &self,
        path: &Expression,
        scope: ScopeId,
        require_collection: bool,
        out: &mut Vec<Diagnostic>,
    ) {
        let K::Path { .. } = &path.kind else {
            self.visit(path, scope, out);
            return;
        };
        let Some(mapping) = self.check_path(path, scope, out) else {
            return;
        };
        let joinable = mapping.kind.is_relationship()
            || mapping.kind.is_collection()
            || mapping.kind == MappingKind::Embedded;
        if (require_collection && !mapping.is_collection()) || !joinable {
            out.push(Diagnostic::error(
                path.span,
                DiagnosticKey::CollectionPathNotCollection,
                format!("'{}' is not a collection-valued path", segments_text(path)),
            ));
        }
    }

    /// Reports resolution failures along a path; returns the last mapping.
    fn check_path(
        &self,
        path: &Expression,
        scope: ScopeId,
        out: &mut Vec<Diagnostic>,
    ) -> Option<Mapping> {
        let K::Path { segments, .. } = &path.kind else {
            return None;
        };
        let resolution = self.context.path_resolution(path.span)?;
        let Some(root) = resolution.root else {
            let provider = self.context.provider();
            let text = segments.join(".");
            if provider.enum_type(&text).is_some() {
                return None;
            }
            if let Some((type_name, constant)) = text.rsplit_once('.') {
                if provider.managed_type(type_name).is_some_and(|ty| ty.is_enum()) {
                    out.push(Diagnostic::error(
                        path.span,
                        DiagnosticKey::EnumConstantUnknown,
                        format!("enum '{type_name}' has no constant '{constant}'"),
                    ));
                    return None;
                }
            }
            if self.context.resolver_in(scope, &segments[0]).is_none() {
                out.push(Diagnostic::error(
                    path.span,
                    DiagnosticKey::IdentificationVariableNotDeclared,
                    format!("identification variable '{}' is not declared", segments[0]),
                ));
            }
            return None;
        };
        let mut parent = root;
        let mut last = None;
        let count = resolution.segments.len();
        for (index, id) in resolution.segments.iter().enumerate() {
            let record = self.context.get(*id);
            let Some(mapping) = &record.mapping else {
                if let Some(parent_type) = &self.context.get(parent).type_name {
                    out.push(Diagnostic::error(
                        path.span,
                        DiagnosticKey::PathNotResolvable,
                        format!(
                            "'{}' is not an attribute of {parent_type} in '{}'",
                            record.name,
                            segments.join(".")
                        ),
                    ));
                }
                return None;
            };
            if index + 1 < count && mapping.is_collection() {
                out.push(Diagnostic::error(
                    path.span,
                    DiagnosticKey::StateFieldPathCollectionType,
                    format!(
                        "'{}' navigates through collection '{}'",
                        segments.join("."),
                        mapping.name
                    ),
                ));
                return None;
            }
            parent = *id;
            last = Some(mapping.clone());
        }
        last
    }

    fn check_usage(
        &self,
        path: &Expression,
        mapping: &Mapping,
        collection_valued: bool,
        out: &mut Vec<Diagnostic>,
    ) {
        if collection_valued && !mapping.is_collection() {
            out.push(Diagnostic::error(
                path.span,
                DiagnosticKey::CollectionPathNotCollection,
                format!("'{}' is not a collection-valued path", segments_text(path)),
            ));
        } else if !collection_valued && mapping.is_collection() {
            out.push(Diagnostic::error(
                path.span,
                DiagnosticKey::StateFieldPathCollectionType,
                format!(
                    "collection-valued path '{}' cannot be used as a value",
                    segments_text(path)
                ),
            ));
        }
    }

    fn check_comparable(
        &self,
        node: &Expression,
        left: &Expression,
        right: &Expression,
        scope: ScopeId,
        out: &mut Vec<Diagnostic>,
    ) {
        let (Some(a), Some(b)) = (self.category(left, scope), self.category(right, scope)) else {
            return;
        };
        if !self.compatible(&a, &b) {
            out.push(Diagnostic::error(
                node.span,
                DiagnosticKey::ComparisonTypeMismatch,
                format!("cannot compare {} with {}", a.label(), b.label()),
            ));
        }
    }

    fn check_numeric(&self, operand: &Expression, scope: ScopeId, out: &mut Vec<Diagnostic>) {
        if let Some(category) = self.category(operand, scope) {
            if category != TypeCategory::Numeric {
                out.push(Diagnostic::error(
                    operand.span,
                    DiagnosticKey::ArithmeticRequiresNumeric,
                    format!("arithmetic requires a numeric operand, found {}", category.label()),
                ));
            }
        }
    }

    fn compatible(&self, a: &TypeCategory, b: &TypeCategory) -> bool {
        match (a, b) {
            (TypeCategory::Entity(x), TypeCategory::Entity(y)) => {
                self.is_subtype(x, y) || self.is_subtype(y, x)
            }
            _ => a == b,
        }
    }

    fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        let provider = self.context.provider();
        let mut current = Some(sub);
        while let Some(name) = current {
            if name == sup {
                return true;
            }
            current = provider.managed_type(name).and_then(|ty| ty.superclass());
        }
        false
    }

    /// Type category of an expression, when it can be determined.
    pub fn category(&self, expr: &Expression, scope: ScopeId) -> Option<TypeCategory> {
        match &expr.kind {
            K::StringLiteral { .. } => Some(TypeCategory::String),
            K::NumericLiteral { .. } => Some(TypeCategory::Numeric),
            K::BooleanLiteral { .. } => Some(TypeCategory::Boolean),
            K::DateTime { .. } => Some(TypeCategory::Temporal),
            K::Binary { op, .. } if op.is_arithmetic() => Some(TypeCategory::Numeric),
            K::Binary { .. }
            | K::Not { .. }
            | K::Between { .. }
            | K::Like { .. }
            | K::In { .. }
            | K::IsNull { .. }
            | K::IsEmpty { .. }
            | K::MemberOf { .. }
            | K::Exists { .. } => Some(TypeCategory::Boolean),
            K::Unary { .. } => Some(TypeCategory::Numeric),
            K::Parenthesized { expression } => self.category(expression, scope),
            K::FunctionCall { name, arguments } => match name.as_str() {
                "ABS" | "SQRT" | "MOD" | "SIZE" | "LENGTH" | "LOCATE" | "INDEX" => {
                    Some(TypeCategory::Numeric)
                }
                "CONCAT" | "SUBSTRING" | "LOWER" | "UPPER" => Some(TypeCategory::String),
                "COALESCE" | "NULLIF" => arguments
                    .iter()
                    .find_map(|argument| self.category(argument, scope)),
                _ => None,
            },
            K::Trim { .. } => Some(TypeCategory::String),
            K::Aggregate { name, argument, .. } => match name.as_str() {
                "COUNT" | "AVG" | "SUM" => Some(TypeCategory::Numeric),
                _ => self.category(argument, scope),
            },
            K::Case {
                whens, otherwise, ..
            } => whens
                .iter()
                .find_map(|when| match &when.kind {
                    K::When { result, .. } => self.category(result, scope),
                    _ => None,
                })
                .or_else(|| self.category(otherwise, scope)),
            K::IdentificationVariable { name } => {
                let type_name = self.context.variable_type(scope, name)?;
                self.type_category(type_name)
            }
            K::Path { segments, .. } => {
                let resolution = self.context.path_resolution(expr.span)?;
                match resolution.root {
                    None => self
                        .context
                        .provider()
                        .enum_type(&segments.join("."))
                        .map(|ty| TypeCategory::Enum(ty.name().to_string())),
                    Some(_) => {
                        let last = resolution.segments.last()?;
                        let mapping = self.context.get(*last).mapping.as_ref()?;
                        if mapping.is_collection() {
                            return None;
                        }
                        self.type_category(mapping.target_type())
                    }
                }
            }
            _ => None,
        }
    }

    fn type_category(&self, type_name: &str) -> Option<TypeCategory> {
        if let Some(ty) = self.context.provider().managed_type(type_name) {
            return match ty.kind() {
                TypeKind::Enum => Some(TypeCategory::Enum(ty.name().to_string())),
                TypeKind::Class => None,
                _ => Some(TypeCategory::Entity(ty.name().to_string())),
            };
        }
        let simple = type_name.rsplit('.').next().unwrap_or(type_name);
        if STRING_TYPES.contains(&simple) {
            Some(TypeCategory::String)
        } else if NUMERIC_TYPES.contains(&simple) {
            Some(TypeCategory::Numeric)
        } else if BOOLEAN_TYPES.contains(&simple) {
            Some(TypeCategory::Boolean)
        } else if TEMPORAL_TYPES.contains(&simple) {
            Some(TypeCategory::Temporal)
        } else {
            None
        }
    }
}

fn segments_text(path: &Expression) -> String {
    match &path.kind {
        K::Path { segments, .. } => segments.join("."),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarKind, GrammarRegistry};
    use crate::parser::Parser;
    use crate::query::metadata::{InMemoryMetadata, ManagedType};

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_type(
                ManagedType::entity("com.acme.Employee", "Employee")
                    .with_basic("name", "String")
                    .with_basic("salary", "long")
                    .with_basic("hired", "java.time.LocalDate")
                    .with_basic("status", "com.acme.Status")
                    .with_relationship("address", MappingKind::OneToOne, "com.acme.Address")
                    .with_relationship("phones", MappingKind::OneToMany, "com.acme.Phone"),
            )
            .with_type(ManagedType::embeddable("com.acme.Address").with_basic("city", "String"))
            .with_type(ManagedType::entity("com.acme.Phone", "Phone").with_basic("number", "String"))
            .with_type(ManagedType::enumeration("com.acme.Status", ["ACTIVE", "RETIRED"]))
            .with_type(ManagedType::class("com.acme.EmployeeView"))
    }

    fn keys(text: &str) -> Vec<DiagnosticKey> {
        let metadata = metadata();
        let registry = GrammarRegistry::new();
        let grammar = registry.get(GrammarKind::Jpql2_1);
        let expression = Parser::parse_statement(&grammar, text).expect("parse");
        let mut context = QueryContext::new(grammar, &metadata);
        context.set_expression(&expression);
        SemanticValidator::new(&context)
            .validate()
            .into_iter()
            .map(|d| d.key)
            .collect()
    }

    #[test]
    fn clean_query_has_no_diagnostics() {
        assert!(keys(
            "SELECT NEW com.acme.EmployeeView(e.name, a.city) FROM Employee e JOIN e.address a \
             WHERE e.salary + 1 > 10 AND e.name LIKE 'J%' AND e.status = com.acme.Status.ACTIVE \
             AND e.phones IS NOT EMPTY AND SIZE(e.phones) > 1"
        )
        .is_empty());
    }

    #[test]
    fn unknown_names_are_reported_in_order() {
        assert_eq!(
            keys("SELECT x FROM Employe e WHERE e.nam = 'a'"),
            vec![
                DiagnosticKey::IdentificationVariableNotDeclared,
                DiagnosticKey::AbstractSchemaNameUnknown,
            ]
        );
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE e.nam = 'a'"),
            vec![DiagnosticKey::PathNotResolvable]
        );
    }

    #[test]
    fn collection_usage_is_checked() {
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE e.phones = 'a'"),
            vec![DiagnosticKey::StateFieldPathCollectionType]
        );
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE e.address IS EMPTY"),
            vec![DiagnosticKey::CollectionPathNotCollection]
        );
        assert_eq!(
            keys("SELECT e FROM Employee e JOIN e.name n"),
            vec![DiagnosticKey::CollectionPathNotCollection]
        );
    }

    #[test]
    fn type_checks() {
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE e.name = 5"),
            vec![DiagnosticKey::ComparisonTypeMismatch]
        );
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE e.salary LIKE 'a%'"),
            vec![DiagnosticKey::LikeRequiresString]
        );
        assert_eq!(
            keys("SELECT e.name + 1 FROM Employee e"),
            vec![DiagnosticKey::ArithmeticRequiresNumeric]
        );
        assert!(keys("SELECT e FROM Employee e WHERE e.hired < CURRENT_DATE").is_empty());
    }

    #[test]
    fn duplicates_constructors_and_type_literals() {
        assert_eq!(
            keys("SELECT e FROM Employee e, Phone e"),
            vec![DiagnosticKey::IdentificationVariableDuplicate]
        );
        assert_eq!(
            keys("SELECT NEW com.acme.Missing(e.name) FROM Employee e"),
            vec![DiagnosticKey::ConstructorClassUnknown]
        );
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE TYPE(e) = Manager"),
            vec![DiagnosticKey::EntityTypeLiteralUnknown]
        );
    }

    #[test]
    fn enum_constants_must_be_declared() {
        assert_eq!(
            keys("SELECT e FROM Employee e WHERE e.status = com.acme.Status.BOGUS"),
            vec![DiagnosticKey::EnumConstantUnknown]
        );
        assert!(keys("SELECT e FROM Employee e WHERE e.status = com.acme.Status.RETIRED").is_empty());
    }

    #[test]
    fn join_fetch_outside_range_declaration() {
        assert_eq!(
            keys(
                "SELECT e FROM Employee e WHERE EXISTS \
                 (SELECT p FROM e.phones p JOIN FETCH p.number)"
            ),
            vec![
                DiagnosticKey::JoinFetchNotInRangeDeclaration,
                DiagnosticKey::CollectionPathNotCollection,
            ]
        );
    }
}
