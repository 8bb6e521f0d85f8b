//! The suggestions-database entry types and the incremental update protocol
//! that keeps a client-side mirror of them in sync.
//!
//! The shapes here intentionally follow an established
//! `SuggestionEntry`/`SuggestionsDatabaseUpdate` family closely: this is the
//! part of the system where matching a known wire contract matters more than
//! inventing a cleaner one.

use crate::types::ExternalId;
use crate::types::Scope;
use serde::Deserialize;
use serde::Serialize;

/// Identifier of a suggestion entry, unique within one suggestions index.
pub type SuggestionEntryId = usize;

/// One argument of a `Function`, `Method`, or `Constructor` suggestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    /// The argument's name.
    pub name: String,
    /// The argument's declared type, as written (e.g. `Number`, `Any`).
    pub repr_type: String,
    /// Whether the argument is declared lazy (`~` suspended).
    pub is_suspended: bool,
    /// Whether the argument has a default value.
    pub has_default: bool,
    /// The default value's source text, if `has_default`.
    pub default_value: Option<String>,
}

/// A named value exported from a module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportedSymbol {
    /// The module itself is being re-exported.
    Module { module: String },
    /// A type defined in `module`.
    Type { module: String, name: String },
    /// A constructor defined in `module`.
    Constructor { module: String, name: String },
    /// A method defined in `module`.
    Method { module: String, name: String },
}

impl ExportedSymbol {
    /// The module this symbol is defined in (the module itself, for
    /// `ExportedSymbol::Module`).
    pub fn defining_module(&self) -> &str {
        match self {
            ExportedSymbol::Module { module }
            | ExportedSymbol::Type { module, .. }
            | ExportedSymbol::Constructor { module, .. }
            | ExportedSymbol::Method { module, .. } => module,
        }
    }
}

/// A request that some module re-exports a given symbol, or stops doing so.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEdge {
    /// The module performing the re-export.
    pub reexporting_module: String,
    /// The symbol being re-exported.
    pub symbol: ExportedSymbol,
    /// Whether this edge adds or removes the re-export annotation.
    pub remove: bool,
}

/// An entry in the suggestions index: one unit of completion/search
/// information about a module-level or lexically-scoped definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SuggestionEntry {
    /// A module, searchable by its own name.
    #[serde(rename_all = "camelCase")]
    Module { module: String, documentation: Option<String>, reexport: Option<String>, external_id: Option<ExternalId> },
    /// A type definition.
    #[serde(rename_all = "camelCase")]
    Type {
        module: String,
        name: String,
        params: Vec<Argument>,
        documentation: Option<String>,
        reexport: Option<String>,
        external_id: Option<ExternalId>,
    },
    /// A constructor of some type.
    #[serde(rename_all = "camelCase")]
    Constructor {
        module: String,
        name: String,
        arguments: Vec<Argument>,
        return_type: String,
        documentation: Option<String>,
        reexport: Option<String>,
        external_id: Option<ExternalId>,
    },
    /// A method defined on some type.
    #[serde(rename_all = "camelCase")]
    Method {
        module: String,
        name: String,
        defined_on_type: String,
        /// Whether this is a static (module-level) method rather than an
        /// instance method.
        is_static: bool,
        arguments: Vec<Argument>,
        return_type: String,
        documentation: Option<String>,
        reexport: Option<String>,
        external_id: Option<ExternalId>,
    },
    /// A conversion method (`A.from (that: B)`).
    #[serde(rename_all = "camelCase")]
    Conversion {
        module: String,
        name: String,
        from_type: String,
        to_type: String,
        arguments: Vec<Argument>,
        documentation: Option<String>,
        reexport: Option<String>,
        external_id: Option<ExternalId>,
    },
    /// A free function defined within a module, visible only in `scope`.
    #[serde(rename_all = "camelCase")]
    Function {
        module: String,
        name: String,
        arguments: Vec<Argument>,
        return_type: String,
        scope: Scope,
        documentation: Option<String>,
        external_id: Option<ExternalId>,
    },
    /// A local binding, visible only in `scope`.
    #[serde(rename_all = "camelCase")]
    Local {
        module: String,
        name: String,
        return_type: String,
        scope: Scope,
        documentation: Option<String>,
        external_id: Option<ExternalId>,
    },
}

/// A structural identity for a suggestion entry, used to detect that an
/// update describes "the same thing" as an existing entry even though it
/// arrives with a new [`SuggestionEntryId`].
///
/// `Type`/`Constructor` share a key formula (module, name) because a type
/// and the constructor introducing it are addressed the same way by name
/// resolution; likewise `Function`/`Local` share (module, name, scope)
/// because both are scope-limited bindings distinguished only by where they
/// are visible.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StructuralKey {
    /// Key for a `Module` entry.
    Module { module: String },
    /// Key shared by `Type` and `Constructor` entries.
    TypeOrConstructor { module: String, name: String },
    /// Key for a `Method` entry.
    Method { module: String, defined_on_type: String, name: String, is_static: bool },
    /// Key for a `Conversion` entry.
    Conversion { module: String, source_type: String, return_type: String },
    /// Key shared by `Function` and `Local` entries.
    FunctionOrLocal { module: String, name: String, scope: Scope },
}

impl SuggestionEntry {
    /// The module this entry belongs to.
    pub fn module(&self) -> &str {
        match self {
            SuggestionEntry::Module { module, .. }
            | SuggestionEntry::Type { module, .. }
            | SuggestionEntry::Constructor { module, .. }
            | SuggestionEntry::Method { module, .. }
            | SuggestionEntry::Conversion { module, .. }
            | SuggestionEntry::Function { module, .. }
            | SuggestionEntry::Local { module, .. } => module,
        }
    }

    /// The entry's own name, where it has one distinct from its module.
    pub fn name(&self) -> Option<&str> {
        match self {
            SuggestionEntry::Module { .. } => None,
            SuggestionEntry::Type { name, .. }
            | SuggestionEntry::Constructor { name, .. }
            | SuggestionEntry::Method { name, .. }
            | SuggestionEntry::Conversion { name, .. }
            | SuggestionEntry::Function { name, .. }
            | SuggestionEntry::Local { name, .. } => Some(name),
        }
    }

    /// The "self type" entries are searched against: `defined_on_type` for
    /// methods, `from_type` for conversions.
    pub fn self_type(&self) -> Option<&str> {
        match self {
            SuggestionEntry::Method { defined_on_type, .. } => Some(defined_on_type),
            SuggestionEntry::Conversion { from_type, .. } => Some(from_type),
            _ => None,
        }
    }

    /// The compiler-assigned stable identifier of this entry, if any, every
    /// entry kind carries one.
    pub fn external_id(&self) -> Option<ExternalId> {
        match self {
            SuggestionEntry::Module { external_id, .. }
            | SuggestionEntry::Type { external_id, .. }
            | SuggestionEntry::Constructor { external_id, .. }
            | SuggestionEntry::Method { external_id, .. }
            | SuggestionEntry::Conversion { external_id, .. }
            | SuggestionEntry::Function { external_id, .. }
            | SuggestionEntry::Local { external_id, .. } => *external_id,
        }
    }

    /// Replace the `external_id` field in place, for every entry kind.
    pub fn set_external_id(&mut self, value: Option<ExternalId>) {
        match self {
            SuggestionEntry::Module { external_id, .. }
            | SuggestionEntry::Type { external_id, .. }
            | SuggestionEntry::Constructor { external_id, .. }
            | SuggestionEntry::Method { external_id, .. }
            | SuggestionEntry::Conversion { external_id, .. }
            | SuggestionEntry::Function { external_id, .. }
            | SuggestionEntry::Local { external_id, .. } => *external_id = value,
        }
    }

    /// Replace the `module` field in place, for every entry kind (all of
    /// them carry one).
    pub fn set_module(&mut self, value: String) {
        match self {
            SuggestionEntry::Module { module, .. }
            | SuggestionEntry::Type { module, .. }
            | SuggestionEntry::Constructor { module, .. }
            | SuggestionEntry::Method { module, .. }
            | SuggestionEntry::Conversion { module, .. }
            | SuggestionEntry::Function { module, .. }
            | SuggestionEntry::Local { module, .. } => *module = value,
        }
    }

    /// Replace the self-type field in place (`defined_on_type` for methods,
    /// `from_type` for conversions). Returns whether the entry kind supports
    /// this field.
    pub fn set_self_type(&mut self, value: String) -> bool {
        match self {
            SuggestionEntry::Method { defined_on_type, .. } => {
                *defined_on_type = value;
                true
            }
            SuggestionEntry::Conversion { from_type, .. } => {
                *from_type = value;
                true
            }
            _ => false,
        }
    }

    /// The return type of this entry, for entries that produce a value.
    pub fn return_type(&self) -> Option<&str> {
        match self {
            SuggestionEntry::Constructor { return_type, .. }
            | SuggestionEntry::Method { return_type, .. }
            | SuggestionEntry::Function { return_type, .. }
            | SuggestionEntry::Local { return_type, .. } => Some(return_type),
            SuggestionEntry::Conversion { to_type, .. } => Some(to_type),
            SuggestionEntry::Module { .. } | SuggestionEntry::Type { .. } => None,
        }
    }

    /// The lexical scope this entry is visible within, for `Function` and
    /// `Local` entries.
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            SuggestionEntry::Function { scope, .. } | SuggestionEntry::Local { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// The currently active re-export annotation, for the entry kinds that
    /// carry one.
    pub fn reexport(&self) -> Option<&str> {
        match self {
            SuggestionEntry::Module { reexport, .. }
            | SuggestionEntry::Type { reexport, .. }
            | SuggestionEntry::Constructor { reexport, .. }
            | SuggestionEntry::Method { reexport, .. }
            | SuggestionEntry::Conversion { reexport, .. } => reexport.as_deref(),
            SuggestionEntry::Function { .. } | SuggestionEntry::Local { .. } => None,
        }
    }

    /// Set the re-export annotation in place, for the entry kinds that carry
    /// one. A no-op for `Function`/`Local`.
    pub fn set_reexport(&mut self, value: Option<String>) {
        match self {
            SuggestionEntry::Module { reexport, .. }
            | SuggestionEntry::Type { reexport, .. }
            | SuggestionEntry::Constructor { reexport, .. }
            | SuggestionEntry::Method { reexport, .. }
            | SuggestionEntry::Conversion { reexport, .. } => *reexport = value,
            SuggestionEntry::Function { .. } | SuggestionEntry::Local { .. } => {}
        }
    }

    /// This entry's structural key, used for deduplication across updates.
    pub fn structural_key(&self) -> StructuralKey {
        match self {
            SuggestionEntry::Module { module, .. } => StructuralKey::Module { module: module.clone() },
            SuggestionEntry::Type { module, name, .. } | SuggestionEntry::Constructor { module, name, .. } => {
                StructuralKey::TypeOrConstructor { module: module.clone(), name: name.clone() }
            }
            SuggestionEntry::Method { module, name, defined_on_type, is_static, .. } => StructuralKey::Method {
                module: module.clone(),
                defined_on_type: defined_on_type.clone(),
                name: name.clone(),
                is_static: *is_static,
            },
            SuggestionEntry::Conversion { module, from_type, to_type, .. } => {
                StructuralKey::Conversion { module: module.clone(), source_type: from_type.clone(), return_type: to_type.clone() }
            }
            SuggestionEntry::Function { module, name, scope, .. } | SuggestionEntry::Local { module, name, scope, .. } => {
                StructuralKey::FunctionOrLocal { module: module.clone(), name: name.clone(), scope: *scope }
            }
        }
    }

    /// Replace the `documentation` field in place, for every entry kind (all
    /// of them carry one).
    pub fn set_documentation(&mut self, value: Option<String>) {
        match self {
            SuggestionEntry::Module { documentation, .. }
            | SuggestionEntry::Type { documentation, .. }
            | SuggestionEntry::Constructor { documentation, .. }
            | SuggestionEntry::Method { documentation, .. }
            | SuggestionEntry::Conversion { documentation, .. }
            | SuggestionEntry::Function { documentation, .. }
            | SuggestionEntry::Local { documentation, .. } => *documentation = value,
        }
    }

    /// Replace the `return_type` field in place, for the entry kinds that
    /// have one. Returns whether the entry kind supports this field.
    pub fn set_return_type(&mut self, value: String) -> bool {
        match self {
            SuggestionEntry::Constructor { return_type, .. }
            | SuggestionEntry::Method { return_type, .. }
            | SuggestionEntry::Function { return_type, .. }
            | SuggestionEntry::Local { return_type, .. } => {
                *return_type = value;
                true
            }
            SuggestionEntry::Conversion { to_type, .. } => {
                *to_type = value;
                true
            }
            SuggestionEntry::Module { .. } | SuggestionEntry::Type { .. } => false,
        }
    }

    /// Replace the `scope` field in place, for `Function`/`Local` entries.
    /// Returns whether the entry kind supports this field.
    pub fn set_scope(&mut self, value: Scope) -> bool {
        match self {
            SuggestionEntry::Function { scope, .. } | SuggestionEntry::Local { scope, .. } => {
                *scope = value;
                true
            }
            _ => false,
        }
    }

    /// The entry's argument list, for the entry kinds that carry one.
    pub fn arguments(&self) -> Option<&Vec<Argument>> {
        match self {
            SuggestionEntry::Constructor { arguments, .. }
            | SuggestionEntry::Method { arguments, .. }
            | SuggestionEntry::Conversion { arguments, .. }
            | SuggestionEntry::Function { arguments, .. } => Some(arguments),
            SuggestionEntry::Module { .. } | SuggestionEntry::Type { .. } | SuggestionEntry::Local { .. } => None,
        }
    }

    /// The entry's argument list, for the entry kinds that carry one.
    pub fn arguments_mut(&mut self) -> Option<&mut Vec<Argument>> {
        match self {
            SuggestionEntry::Constructor { arguments, .. }
            | SuggestionEntry::Method { arguments, .. }
            | SuggestionEntry::Conversion { arguments, .. }
            | SuggestionEntry::Function { arguments, .. } => Some(arguments),
            SuggestionEntry::Module { .. } | SuggestionEntry::Type { .. } | SuggestionEntry::Local { .. } => None,
        }
    }

    /// Apply one [`ArgUpdate`] to this entry's argument list in place.
    /// Returns whether the update actually changed anything (the entry kind
    /// has arguments and the targeted index was in range for `Remove`/
    /// `Modify`, or in range to insert at for `Add`).
    pub fn apply_arg_update(&mut self, update: &ArgUpdate) -> bool {
        let Some(arguments) = self.arguments_mut() else { return false };
        match update {
            ArgUpdate::Add { index, argument } => {
                if *index > arguments.len() {
                    return false;
                }
                arguments.insert(*index, argument.clone());
                true
            }
            ArgUpdate::Remove { index } => {
                if *index >= arguments.len() {
                    return false;
                }
                arguments.remove(*index);
                true
            }
            ArgUpdate::Modify { index, name, repr_type, is_suspended, has_default, default_value } => {
                let Some(argument) = arguments.get_mut(*index) else { return false };
                let mut changed = false;
                if let Some(name) = name {
                    if &argument.name != name {
                        argument.name = name.clone();
                        changed = true;
                    }
                }
                if let Some(repr_type) = repr_type {
                    if &argument.repr_type != repr_type {
                        argument.repr_type = repr_type.clone();
                        changed = true;
                    }
                }
                if let Some(is_suspended) = is_suspended {
                    changed |= argument.is_suspended != *is_suspended;
                    argument.is_suspended = *is_suspended;
                }
                if let Some(has_default) = has_default {
                    changed |= argument.has_default != *has_default;
                    argument.has_default = *has_default;
                }
                let new_default = default_value.apply_to_option(&argument.default_value);
                if new_default != argument.default_value {
                    argument.default_value = new_default;
                    changed = true;
                }
                changed
            }
        }
    }

    /// Rewrite every `Test.`-prefixed module/type-name string this entry
    /// carries to `Best.`-prefixed, given old/new project names. Returns
    /// which field categories actually changed.
    pub fn rename_project(&mut self, old_prefix: &str, new_prefix: &str) -> RenamedFields {
        let mut renamed = RenamedFields::default();
        let rewrite = |s: &mut String, flag: &mut bool| {
            if let Some(rest) = s.strip_prefix(old_prefix) {
                *s = format!("{new_prefix}{rest}");
                *flag = true;
            }
        };
        match self {
            SuggestionEntry::Module { module, .. } => rewrite(module, &mut renamed.module),
            SuggestionEntry::Type { module, .. } => rewrite(module, &mut renamed.module),
            SuggestionEntry::Constructor { module, return_type, .. } => {
                rewrite(module, &mut renamed.module);
                rewrite(return_type, &mut renamed.return_type);
            }
            SuggestionEntry::Method { module, defined_on_type, return_type, arguments, .. } => {
                rewrite(module, &mut renamed.module);
                rewrite(defined_on_type, &mut renamed.self_type);
                rewrite(return_type, &mut renamed.return_type);
                for argument in arguments {
                    rewrite(&mut argument.repr_type, &mut renamed.argument_type);
                }
            }
            SuggestionEntry::Conversion { module, from_type, to_type, arguments, .. } => {
                rewrite(module, &mut renamed.module);
                rewrite(from_type, &mut renamed.self_type);
                rewrite(to_type, &mut renamed.return_type);
                for argument in arguments {
                    rewrite(&mut argument.repr_type, &mut renamed.argument_type);
                }
            }
            SuggestionEntry::Function { module, return_type, arguments, .. } => {
                rewrite(module, &mut renamed.module);
                rewrite(return_type, &mut renamed.return_type);
                for argument in arguments {
                    rewrite(&mut argument.repr_type, &mut renamed.argument_type);
                }
            }
            SuggestionEntry::Local { module, return_type, .. } => {
                rewrite(module, &mut renamed.module);
                rewrite(return_type, &mut renamed.return_type);
            }
        }
        renamed
    }
}

/// Which field categories a [`SuggestionEntry::rename_project`] call
/// actually touched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenamedFields {
    /// The entry's `module` field changed.
    pub module: bool,
    /// The entry's self-type field changed.
    pub self_type: bool,
    /// The entry's return-type field changed.
    pub return_type: bool,
    /// At least one argument's type changed.
    pub argument_type: bool,
}

impl RenamedFields {
    /// Whether any category changed.
    pub fn any(&self) -> bool {
        self.module || self.self_type || self.return_type || self.argument_type
    }
}

/// A single field change within a [`SuggestionUpdate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldUpdate<T> {
    /// Leave the field as-is.
    NoChange,
    /// Clear the field (only valid for `Option<T>` fields).
    Remove,
    /// Replace the field with a new value.
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::NoChange
    }
}

impl<T: Clone> FieldUpdate<T> {
    /// Apply this update to an existing `Option<T>` field.
    pub fn apply_to_option(&self, current: &Option<T>) -> Option<T> {
        match self {
            FieldUpdate::NoChange => current.clone(),
            FieldUpdate::Remove => None,
            FieldUpdate::Set(value) => Some(value.clone()),
        }
    }

    /// Apply this update to an existing required field.
    pub fn apply_to_required(&self, current: &T) -> T {
        match self {
            FieldUpdate::NoChange => current.clone(),
            FieldUpdate::Remove => current.clone(),
            FieldUpdate::Set(value) => value.clone(),
        }
    }

    /// Whether this update would actually change `current`.
    pub fn changes(&self, current: &Option<T>) -> bool
    where
        T: PartialEq,
    {
        &self.apply_to_option(current) != current
    }
}

/// A change to a single argument slot of a `Method`/`Function`/`Constructor`/
/// `Conversion` entry's argument list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ArgUpdate {
    /// Insert `argument` at `index`, shifting later arguments right. Grows
    /// the list by one.
    Add { index: usize, argument: Argument },
    /// Remove the argument at `index`, shifting later arguments left.
    /// Shrinks the list by one.
    Remove { index: usize },
    /// Partially update the argument at `index` in place; absent fields are
    /// left unchanged.
    Modify {
        index: usize,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        repr_type: Option<String>,
        #[serde(default)]
        is_suspended: Option<bool>,
        #[serde(default)]
        has_default: Option<bool>,
        #[serde(default)]
        default_value: FieldUpdate<String>,
    },
}

/// The set of field-level changes carried by one [`SuggestionUpdate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdates {
    /// Change to the entry's stable compiler-assigned identifier.
    #[serde(default)]
    pub external_id: FieldUpdate<ExternalId>,
    /// Change to the `module` field.
    #[serde(default)]
    pub module: FieldUpdate<String>,
    /// Change to the self-type field (`defined_on_type`/`from_type`).
    #[serde(default)]
    pub self_type: FieldUpdate<String>,
    /// Change to the `return_type` field.
    #[serde(default)]
    pub return_type: FieldUpdate<String>,
    /// Change to the `documentation` field.
    #[serde(default)]
    pub documentation: FieldUpdate<String>,
    /// Change to the `scope` field.
    #[serde(default)]
    pub scope: FieldUpdate<Scope>,
    /// Updates to individual arguments: insertions, removals, and partial
    /// modifications, applied in order.
    #[serde(default)]
    pub arguments: Vec<ArgUpdate>,
    /// Change to the `reexport` field.
    #[serde(default)]
    pub reexport: FieldUpdate<String>,
}

impl FieldUpdates {
    /// Whether this set of field updates is entirely a no-op.
    pub fn is_noop(&self) -> bool {
        matches!(self.external_id, FieldUpdate::NoChange)
            && matches!(self.module, FieldUpdate::NoChange)
            && matches!(self.self_type, FieldUpdate::NoChange)
            && matches!(self.return_type, FieldUpdate::NoChange)
            && matches!(self.documentation, FieldUpdate::NoChange)
            && matches!(self.scope, FieldUpdate::NoChange)
            && self.arguments.is_empty()
            && matches!(self.reexport, FieldUpdate::NoChange)
    }
}

/// One incremental change to the suggestions index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SuggestionUpdate {
    /// Add a brand-new entry.
    #[serde(rename_all = "camelCase")]
    Add { id: SuggestionEntryId, entry: SuggestionEntry },
    /// Remove an existing entry.
    #[serde(rename_all = "camelCase")]
    Remove { id: SuggestionEntryId },
    /// Modify fields of an existing entry in place.
    #[serde(rename_all = "camelCase")]
    Modify { id: SuggestionEntryId, fields: FieldUpdates },
}

/// A description of how a module's suggestions should be treated before a
/// batch of updates for it is applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ModuleUpdateAction {
    /// Drop every entry currently attributed to `module` before applying the
    /// accompanying updates. Used when a module was fully reparsed and its
    /// old entry set cannot be trusted to diff cleanly against the new one.
    #[serde(rename_all = "camelCase")]
    CleanModule { module: String },
}

/// A batch of suggestions-database changes for a single module, plus the
/// version the index will be at once they are applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsDatabaseUpdate {
    /// The module these updates originate from.
    pub module: String,
    /// If present, applied before `updates`.
    pub action: Option<ModuleUpdateAction>,
    /// The individual entry changes to apply, in order.
    pub updates: Vec<SuggestionUpdate>,
    /// The index version this batch brings the database to.
    pub new_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> crate::types::Position {
        crate::types::Position { line, column }
    }

    #[test]
    fn type_and_constructor_share_structural_key() {
        let ty = SuggestionEntry::Type {
            module: "Standard.Base".into(),
            name: "Maybe".into(),
            params: vec![],
            documentation: None,
            reexport: None,
            external_id: None,
        };
        let ctor = SuggestionEntry::Constructor {
            module: "Standard.Base".into(),
            name: "Maybe".into(),
            arguments: vec![],
            return_type: "Maybe".into(),
            documentation: None,
            reexport: None,
            external_id: None,
        };
        assert_eq!(ty.structural_key(), ctor.structural_key());
    }

    #[test]
    fn function_and_local_share_structural_key_when_scope_matches() {
        let scope = Scope { start: pos(0, 0), end: pos(5, 0) };
        let function = SuggestionEntry::Function {
            module: "Main".into(),
            name: "foo".into(),
            arguments: vec![],
            return_type: "Any".into(),
            scope,
            documentation: None,
            external_id: None,
        };
        let local = SuggestionEntry::Local {
            module: "Main".into(),
            name: "foo".into(),
            return_type: "Any".into(),
            scope,
            documentation: None,
            external_id: None,
        };
        assert_eq!(function.structural_key(), local.structural_key());
    }

    #[test]
    fn field_update_set_overrides_current() {
        let update = FieldUpdate::Set("new docs".to_string());
        assert_eq!(update.apply_to_option(&Some("old docs".to_string())), Some("new docs".to_string()));
        let remove: FieldUpdate<String> = FieldUpdate::Remove;
        assert_eq!(remove.apply_to_option(&Some("old docs".to_string())), None);
        let no_change: FieldUpdate<String> = FieldUpdate::NoChange;
        assert_eq!(no_change.apply_to_option(&Some("old docs".to_string())), Some("old docs".to_string()));
    }

    #[test]
    fn field_updates_is_noop_detects_all_default() {
        assert!(FieldUpdates::default().is_noop());
        let changed = FieldUpdates { return_type: FieldUpdate::Set("Number".into()), ..Default::default() };
        assert!(!changed.is_noop());
    }

    #[test]
    fn rename_project_rewrites_module_and_argument_types() {
        let mut method = SuggestionEntry::Method {
            module: "Test.Main".into(),
            name: "foo".into(),
            defined_on_type: "Test.Main.Widget".into(),
            is_static: false,
            arguments: vec![Argument {
                name: "x".into(),
                repr_type: "Test.Main.Widget".into(),
                is_suspended: false,
                has_default: false,
                default_value: None,
            }],
            return_type: "Test.Main.Widget".into(),
            documentation: None,
            reexport: None,
            external_id: None,
        };
        let renamed = method.rename_project("Test.", "Best.");
        assert!(renamed.any());
        assert_eq!(method.module(), "Best.Main");
        assert_eq!(method.self_type(), Some("Best.Main.Widget"));
        assert_eq!(method.return_type(), Some("Best.Main.Widget"));
    }

    #[test]
    fn rename_project_is_noop_when_prefix_absent() {
        let mut module =
            SuggestionEntry::Module { module: "Standard.Base".into(), documentation: None, reexport: None, external_id: None };
        let renamed = module.rename_project("Test.", "Best.");
        assert!(!renamed.any());
    }

    #[test]
    fn apply_arg_update_add_inserts_and_grows() {
        let mut method = SuggestionEntry::Method {
            module: "Main".into(),
            name: "foo".into(),
            defined_on_type: "Main.Widget".into(),
            is_static: false,
            arguments: vec![Argument {
                name: "x".into(),
                repr_type: "Number".into(),
                is_suspended: false,
                has_default: false,
                default_value: None,
            }],
            return_type: "Any".into(),
            documentation: None,
            reexport: None,
            external_id: None,
        };
        let added = Argument {
            name: "y".into(),
            repr_type: "Text".into(),
            is_suspended: false,
            has_default: false,
            default_value: None,
        };
        let changed = method.apply_arg_update(&ArgUpdate::Add { index: 1, argument: added });
        assert!(changed);
        let args = method.arguments_mut().unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].name, "y");
    }

    #[test]
    fn apply_arg_update_remove_shrinks() {
        let mut function = SuggestionEntry::Function {
            module: "Main".into(),
            name: "foo".into(),
            arguments: vec![
                Argument { name: "x".into(), repr_type: "Number".into(), is_suspended: false, has_default: false, default_value: None },
                Argument { name: "y".into(), repr_type: "Text".into(), is_suspended: false, has_default: false, default_value: None },
            ],
            return_type: "Any".into(),
            scope: Scope { start: pos(0, 0), end: pos(5, 0) },
            documentation: None,
            external_id: None,
        };
        let changed = function.apply_arg_update(&ArgUpdate::Remove { index: 0 });
        assert!(changed);
        let args = function.arguments_mut().unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].name, "y");
    }

    #[test]
    fn apply_arg_update_modify_is_partial() {
        let mut function = SuggestionEntry::Function {
            module: "Main".into(),
            name: "foo".into(),
            arguments: vec![Argument {
                name: "x".into(),
                repr_type: "Number".into(),
                is_suspended: false,
                has_default: false,
                default_value: None,
            }],
            return_type: "Any".into(),
            scope: Scope { start: pos(0, 0), end: pos(5, 0) },
            documentation: None,
            external_id: None,
        };
        let changed = function.apply_arg_update(&ArgUpdate::Modify {
            index: 0,
            name: None,
            repr_type: Some("Text".into()),
            is_suspended: None,
            has_default: None,
            default_value: FieldUpdate::NoChange,
        });
        assert!(changed);
        let args = function.arguments_mut().unwrap();
        assert_eq!(args[0].name, "x");
        assert_eq!(args[0].repr_type, "Text");
    }

    #[test]
    fn set_external_id_module_and_self_type_round_trip() {
        let mut method = SuggestionEntry::Method {
            module: "Main".into(),
            name: "foo".into(),
            defined_on_type: "Main.Widget".into(),
            is_static: false,
            arguments: vec![],
            return_type: "Any".into(),
            documentation: None,
            reexport: None,
            external_id: None,
        };
        let id = ExternalId::from_u128(1);
        method.set_external_id(Some(id));
        method.set_module("Other".into());
        assert!(method.set_self_type("Other.Widget".into()));
        assert_eq!(method.external_id(), Some(id));
        assert_eq!(method.module(), "Other");
        assert_eq!(method.self_type(), Some("Other.Widget"));

        let mut ty = SuggestionEntry::Type {
            module: "Main".into(),
            name: "Widget".into(),
            params: vec![],
            documentation: None,
            reexport: None,
            external_id: None,
        };
        assert!(!ty.set_self_type("Nope".into()));
    }
}
