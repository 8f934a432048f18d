#![forbid(unsafe_code)]

//! Rename refactorings over the editable query model.
//!
//! A [`RefactoringTool`] parses its query once (tolerantly), keeps the state
//! tree for its whole lifetime and applies every rename to that tree, so
//! successive renames compose. Field renames consult the resolver chain; the
//! tool rebuilds its [`QueryContext`] from the current text whenever an
//! earlier rename may have invalidated it.

mod renamers;

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::grammar::{bnf_ids, Grammar};
use crate::model::{build_state, traverse, Formatter, StateObject};
use crate::parser::Parser;
use crate::query::context::QueryContext;
use crate::query::metadata::ManagedTypeProvider;
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};

use renamers::{
    ClassNameRenamer, EntityNameRenamer, EnumConstantRenamer, FieldRenamer, VariableRenamer,
};

/// Rename operations on one query.
pub struct RefactoringTool<'p> {
    grammar: Arc<Grammar>,
    provider: &'p dyn ManagedTypeProvider,
    text: String,
    bnf_id: String,
    formatter: Formatter,
    state: Option<StateObject>,
    context: Option<QueryContext<'p>>,
    context_stale: bool,
}

impl<'p> RefactoringTool<'p> {
    /// Tool over a full statement.
    pub fn new(
        grammar: Arc<Grammar>,
        provider: &'p dyn ManagedTypeProvider,
        text: impl Into<String>,
    ) -> Self {
        Self::with_bnf(grammar, provider, text, bnf_ids::QL_STATEMENT)
    }

    /// Tool over a fragment parsed from `bnf_id`.
    pub fn with_bnf(
        grammar: Arc<Grammar>,
        provider: &'p dyn ManagedTypeProvider,
        text: impl Into<String>,
        bnf_id: &str,
    ) -> Self {
        Self {
            grammar,
            provider,
            text: text.into(),
            bnf_id: bnf_id.to_string(),
            formatter: Formatter::default(),
            state: None,
            context: None,
            context_stale: false,
        }
    }

    /// Replaces the formatter used by [`to_actual_text`](Self::to_actual_text).
    pub fn set_formatter(&mut self, formatter: Formatter) {
        self.formatter = formatter;
    }

    /// Query text the tool was created with.
    pub fn original_text(&self) -> &str {
        &self.text
    }

    /// State tree, built on first access.
    pub fn state_object(&mut self) -> Result<&mut StateObject> {
        let state = match self.state.take() {
            Some(state) => state,
            None => {
                let expression = Parser::parse(&self.grammar, &self.text, &self.bnf_id, true)?;
                debug!(
                    bnf = %self.bnf_id,
                    incomplete = expression.is_incomplete(),
                    "refactor.state.built"
                );
                build_state(expression.root())
            }
        };
        Ok(self.state.insert(state))
    }

    /// Formats the current state tree.
    pub fn to_actual_text(&mut self) -> Result<String> {
        let formatter = self.formatter;
        Ok(formatter.format(self.state_object()?))
    }

    /// Renames a constructor class (exact match on the qualified name).
    pub fn rename_class_name(&mut self, old: &str, new: &str) -> Result<usize> {
        let mut renamer = ClassNameRenamer {
            old,
            new,
            changes: 0,
        };
        self.apply("class", old, new, &mut |state: &mut StateObject| {
            traverse(state, &mut renamer);
            renamer.changes
        })
    }

    /// Renames an entity (case-sensitive).
    pub fn rename_entity_name(&mut self, old: &str, new: &str) -> Result<usize> {
        let mut renamer = EntityNameRenamer {
            old,
            new,
            changes: 0,
        };
        self.apply("entity", old, new, &mut |state: &mut StateObject| {
            traverse(state, &mut renamer);
            renamer.changes
        })
    }

    /// Renames `Type.OLD` to `Type.NEW` where `Type` is an enum.
    pub fn rename_enum_constant(&mut self, old: &str, new: &str) -> Result<usize> {
        let mut renamer = EnumConstantRenamer {
            provider: self.provider,
            old,
            new,
            changes: 0,
        };
        self.apply("enum", old, new, &mut |state: &mut StateObject| {
            traverse(state, &mut renamer);
            renamer.changes
        })
    }

    /// Renames an identification variable (case-insensitive).
    pub fn rename_variable(&mut self, old: &str, new: &str) -> Result<usize> {
        let mut renamer = VariableRenamer {
            old,
            new,
            changes: 0,
        };
        self.apply("variable", old, new, &mut |state: &mut StateObject| {
            traverse(state, &mut renamer);
            renamer.changes
        })
    }

    /// Renames attribute `old` declared by `type_name` in every path.
    pub fn rename_field(&mut self, type_name: &str, old: &str, new: &str) -> Result<usize> {
        let timer = profile_timer();
        self.state_object()?;
        self.refresh_context()?;
        let changes = match (self.state.as_mut(), self.context.as_mut()) {
            (Some(state), Some(context)) => {
                let mut renamer = FieldRenamer::new(context, type_name, old, new);
                traverse(state, &mut renamer);
                renamer.changes
            }
            _ => 0,
        };
        self.finish("field", old, new, changes, timer);
        Ok(changes)
    }

    fn apply(
        &mut self,
        kind: &'static str,
        old: &str,
        new: &str,
        rename: &mut dyn FnMut(&mut StateObject) -> usize,
    ) -> Result<usize> {
        let timer = profile_timer();
        let changes = rename(self.state_object()?);
        self.finish(kind, old, new, changes, timer);
        Ok(changes)
    }

    fn finish(
        &mut self,
        kind: &'static str,
        old: &str,
        new: &str,
        changes: usize,
        timer: Option<std::time::Instant>,
    ) {
        if changes > 0 {
            self.context_stale = true;
        }
        record_profile_timer(QueryProfileKind::Refactor, timer);
        debug!(kind, old, new, changes, "refactor.rename.completed");
    }

    fn refresh_context(&mut self) -> Result<()> {
        if self.context.is_some() && !self.context_stale {
            return Ok(());
        }
        let text = self.to_actual_text()?;
        let expression = Parser::parse(&self.grammar, &text, &self.bnf_id, true)?;
        let mut context = QueryContext::new(Arc::clone(&self.grammar), self.provider);
        context.set_expression(&expression);
        debug!(rebuilt = self.context.is_some(), "refactor.context.refreshed");
        self.context = Some(context);
        self.context_stale = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarKind, GrammarRegistry};
    use crate::query::metadata::{InMemoryMetadata, ManagedType, MappingKind};

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_type(
                ManagedType::entity("com.acme.Employee", "Employee")
                    .with_basic("name", "String")
                    .with_relationship("manager", MappingKind::ManyToOne, "com.acme.Employee")
                    .with_relationship("phones", MappingKind::OneToMany, "com.acme.Phone"),
            )
            .with_type(
                ManagedType::entity("com.acme.Phone", "Phone")
                    .with_basic("name", "String")
                    .with_basic("number", "String"),
            )
    }

    fn tool<'p>(metadata: &'p InMemoryMetadata, text: &str) -> RefactoringTool<'p> {
        let registry = GrammarRegistry::new();
        RefactoringTool::new(registry.get(GrammarKind::Jpql2_1), metadata, text)
    }

    #[test]
    fn field_rename_only_touches_declaring_type() {
        let metadata = metadata();
        let mut tool = tool(
            &metadata,
            "SELECT e FROM Employee e, IN(e.phones) p WHERE e.name = p.name AND e.manager.name = 'x'",
        );
        assert_eq!(
            tool.rename_field("com.acme.Employee", "name", "fullName")
                .expect("rename"),
            2
        );
        assert_eq!(
            tool.to_actual_text().expect("text"),
            "SELECT e FROM Employee e, IN(e.phones) p WHERE e.fullName = p.name AND e.manager.fullName = 'x'"
        );
    }

    #[test]
    fn field_rename_stops_at_first_match() {
        let metadata = metadata();
        let mut tool = tool(&metadata, "SELECT e.manager.manager FROM Employee e");
        assert_eq!(
            tool.rename_field("Employee", "manager", "boss").expect("rename"),
            1
        );
        assert_eq!(
            tool.to_actual_text().expect("text"),
            "SELECT e.boss.manager FROM Employee e"
        );
    }

    #[test]
    fn renames_compose_after_variable_rename() {
        let metadata = metadata();
        let mut tool = tool(&metadata, "SELECT e FROM Employee e WHERE e.name = 'x'");
        assert_eq!(tool.rename_field("Employee", "name", "label").expect("field"), 1);
        assert_eq!(tool.rename_variable("E", "emp").expect("variable"), 3);
        assert_eq!(tool.rename_field("Employee", "label", "title").expect("field"), 0);
        assert_eq!(
            tool.to_actual_text().expect("text"),
            "SELECT emp FROM Employee emp WHERE emp.label = 'x'"
        );
    }

    #[test]
    fn class_rename_round_trips() {
        let metadata = metadata();
        let text = "SELECT NEW com.acme.View(e.name) FROM Employee e";
        let mut tool = tool(&metadata, text);
        assert_eq!(tool.rename_class_name("com.acme.View", "com.acme.Row").expect("x"), 1);
        assert_eq!(tool.rename_class_name("com.acme.Row", "com.acme.View").expect("y"), 1);
        assert_eq!(tool.to_actual_text().expect("text"), text);
        assert_eq!(tool.rename_class_name("View", "Row").expect("z"), 0);
    }

    #[test]
    fn entity_rename_is_case_sensitive() {
        let metadata = metadata();
        let mut tool = tool(
            &metadata,
            "SELECT e FROM Employee e WHERE TYPE(e) IN (Employee) AND EXISTS (SELECT p FROM employee p)",
        );
        assert_eq!(tool.rename_entity_name("Employee", "Staff").expect("rename"), 2);
        assert_eq!(
            tool.to_actual_text().expect("text"),
            "SELECT e FROM Staff e WHERE TYPE(e) IN (Staff) AND EXISTS (SELECT p FROM employee p)"
        );
    }
}
