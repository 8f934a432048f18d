//! Rename visitors.

use crate::model::{traverse, StateObject, StateVisitor, Visit};
use crate::query::context::{QueryContext, ScopeId};
use crate::query::metadata::{simple_name, ManagedTypeProvider};

/// `NEW old(...)` to `NEW new(...)`.
pub(crate) struct ClassNameRenamer<'a> {
    pub old: &'a str,
    pub new: &'a str,
    pub changes: usize,
}

impl StateVisitor for ClassNameRenamer<'_> {
    fn visit(&mut self, state: &mut StateObject) -> Visit {
        if let StateObject::Constructor(constructor) = state {
            if constructor.class_name() == self.old {
                constructor.set_class_name(self.new);
                self.changes += 1;
            }
        }
        Visit::Continue
    }
}

/// Entity names in range declarations and type tests.
///
/// Identification variables spelled like the entity are renamed with it,
/// including path roots, so declarations and references stay consistent.
pub(crate) struct EntityNameRenamer<'a> {
    pub old: &'a str,
    pub new: &'a str,
    pub changes: usize,
}

impl StateVisitor for EntityNameRenamer<'_> {
    fn visit(&mut self, state: &mut StateObject) -> Visit {
        let renamed = match state {
            StateObject::Path(path) => {
                path.identification_variable_mut();
                false
            }
            StateObject::AbstractSchemaName(name) if name.text() == self.old => {
                name.set_text(self.new);
                true
            }
            StateObject::EntityTypeLiteral(literal) if literal.text() == self.old => {
                literal.set_text(self.new);
                true
            }
            StateObject::IdentificationVariable(variable) if variable.text() == self.old => {
                variable.set_text(self.new);
                true
            }
            _ => false,
        };
        if renamed {
            self.changes += 1;
        }
        Visit::Continue
    }
}

/// `Type.OLD` to `Type.NEW` when the prefix is an enum.
pub(crate) struct EnumConstantRenamer<'a> {
    pub provider: &'a dyn ManagedTypeProvider,
    pub old: &'a str,
    pub new: &'a str,
    pub changes: usize,
}

impl StateVisitor for EnumConstantRenamer<'_> {
    fn visit(&mut self, state: &mut StateObject) -> Visit {
        if let StateObject::Path(path) = state {
            let text = path.path_text();
            if text == self.old && self.provider.enum_type(&text).is_some() {
                path.set_path_text(self.new);
                self.changes += 1;
            }
        }
        Visit::Continue
    }
}

/// Identification variables, case-insensitively, including path roots.
pub(crate) struct VariableRenamer<'a> {
    pub old: &'a str,
    pub new: &'a str,
    pub changes: usize,
}

impl StateVisitor for VariableRenamer<'_> {
    fn visit(&mut self, state: &mut StateObject) -> Visit {
        match state {
            StateObject::Path(path) => {
                // Materialized roots are visited as children of the path.
                path.identification_variable_mut();
            }
            StateObject::IdentificationVariable(variable)
                if variable.text().eq_ignore_ascii_case(self.old) =>
            {
                variable.set_text(self.new);
                self.changes += 1;
            }
            StateObject::ResultVariable { name, .. } if name.eq_ignore_ascii_case(self.old) => {
                *name = self.new.to_string();
                self.changes += 1;
            }
            _ => {}
        }
        Visit::Continue
    }
}

/// Renames the first path segment whose mapping is `type_name.old`.
pub(crate) struct FieldRenamer<'a, 'p> {
    context: &'a mut QueryContext<'p>,
    type_name: &'a str,
    old: &'a str,
    new: &'a str,
    scopes: Vec<ScopeId>,
    next_scope: usize,
    scope: ScopeId,
    at_root: bool,
    pub changes: usize,
}

impl<'a, 'p> FieldRenamer<'a, 'p> {
    pub fn new(
        context: &'a mut QueryContext<'p>,
        type_name: &'a str,
        old: &'a str,
        new: &'a str,
    ) -> Self {
        let mut scopes: Vec<(usize, ScopeId)> = context
            .scopes()
            .iter()
            .map(|scope| (scope.span.start, scope.id))
            .collect();
        scopes.sort_by_key(|(start, id)| (*start, *id));
        Self {
            context,
            type_name,
            old,
            new,
            scopes: scopes.into_iter().map(|(_, id)| id).collect(),
            next_scope: 0,
            scope: ScopeId::ROOT,
            at_root: true,
            changes: 0,
        }
    }

    fn declared_by(&self, declaring_type: &str) -> bool {
        declaring_type == self.type_name
            || (!self.type_name.contains('.') && simple_name(declaring_type) == self.type_name)
    }

    fn rename(&mut self, path: &mut crate::model::PathState) {
        let count = path.segment_count();
        let Some(root) = path
            .segment(0)
            .and_then(|name| self.context.resolver_in(self.scope, name))
        else {
            return;
        };
        let mut current = root;
        for index in 1..count {
            let Some(segment) = path.segment(index).map(str::to_string) else {
                break;
            };
            let collection_valued = index + 1 == count && path.is_collection_valued();
            current = self
                .context
                .child_or_create(current, &segment, collection_valued);
            let Some(mapping) = &self.context.get(current).mapping else {
                break;
            };
            if mapping.name == self.old && self.declared_by(&mapping.declaring_type) {
                path.set_path(index, self.new);
                self.changes += 1;
                break;
            }
        }
    }
}

impl StateVisitor for FieldRenamer<'_, '_> {
    fn visit(&mut self, state: &mut StateObject) -> Visit {
        let at_root = std::mem::replace(&mut self.at_root, false);
        match state {
            StateObject::Subquery { .. } if !at_root => {
                self.next_scope += 1;
                let scope = self
                    .scopes
                    .get(self.next_scope)
                    .copied()
                    .unwrap_or(self.scope);
                let outer = std::mem::replace(&mut self.scope, scope);
                for child in state.children_mut() {
                    traverse(child, self);
                }
                self.scope = outer;
                Visit::Skip
            }
            StateObject::Path(path) => {
                self.rename(path);
                Visit::Continue
            }
            _ => Visit::Continue,
        }
    }
}
