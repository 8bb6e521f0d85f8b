//! The suggestions index: a versioned, incrementally updated store of
//! [`SuggestionEntry`] values with structural dedup and secondary indexes
//! for search.
//!
//! Modeled on a `DataStore` pattern common to suggestion-database
//! implementations: a flat `HashMap<SuggestionId, Rc<Entry>>` with
//! linear-scan query methods (`get_module_methods`, `get_methods_for_type`,
//! `get_atom`, ...). This module keeps that flat storage and query-method
//! style, and adds the versioning, structural-key dedup, project-rename,
//! and export-annotation operations required on top of it.

use protocol::prelude::*;
use std::collections::HashMap;

/// A structured query against the index, mirroring its `search` filter set.
///
/// An absent field means "no constraint"; an explicitly empty `self_types`
/// or `kinds` list means "match nothing", distinguishing "I didn't ask"
/// from "I asked for none of these".
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    /// Restrict to entries in this module. An empty string is equivalent to
    /// no module constraint.
    pub module: Option<String>,
    /// Restrict to entries whose self-type is one of these, when present.
    pub self_types: Option<Vec<String>>,
    /// Restrict to entries with this return type.
    pub return_type: Option<String>,
    /// Restrict to entries of these structural kinds, when present.
    pub kinds: Option<Vec<EntryKind>>,
    /// Restrict to entries visible at this source position (applies only to
    /// entries with a `scope`; entries without one are never excluded by
    /// this filter).
    pub position: Option<Position>,
}

/// The coarse kind tag of a [`SuggestionEntry`], used by [`SearchFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Module,
    Type,
    Constructor,
    Method,
    Conversion,
    Function,
    Local,
}

fn kind_of(entry: &SuggestionEntry) -> EntryKind {
    match entry {
        SuggestionEntry::Module { .. } => EntryKind::Module,
        SuggestionEntry::Type { .. } => EntryKind::Type,
        SuggestionEntry::Constructor { .. } => EntryKind::Constructor,
        SuggestionEntry::Method { .. } => EntryKind::Method,
        SuggestionEntry::Conversion { .. } => EntryKind::Conversion,
        SuggestionEntry::Function { .. } => EntryKind::Function,
        SuggestionEntry::Local { .. } => EntryKind::Local,
    }
}

/// How closely an entry's self-type matched a search filter, used to order
/// results by specificity.
fn match_specificity(entry: &SuggestionEntry, wanted: &[String]) -> Option<usize> {
    let self_type = entry.self_type()?;
    wanted.iter().position(|candidate| candidate == self_type)
}

/// The incrementally maintained suggestions database.
#[derive(Debug, Default)]
pub struct SuggestionsIndex {
    entries: HashMap<SuggestionEntryId, SuggestionEntry>,
    structural: HashMap<StructuralKey, SuggestionEntryId>,
    next_id: SuggestionEntryId,
    version: u64,
}

impl SuggestionsIndex {
    /// A fresh, empty index at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current version.
    pub fn current_version(&self) -> u64 {
        self.version
    }

    /// Look up a single entry by id.
    pub fn get(&self, id: SuggestionEntryId) -> Option<&SuggestionEntry> {
        self.entries.get(&id)
    }

    fn allocate_id(&mut self) -> SuggestionEntryId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Apply one batch of updates scoped to `module`, optionally preceded by
    /// a coarse `action`. Returns the resulting version. Fails (leaving the
    /// index unchanged) if any update references an id that does not exist.
    pub fn apply_module_update(
        &mut self,
        module: &str,
        action: Option<&ModuleUpdateAction>,
        updates: &[SuggestionUpdate],
    ) -> FallibleResult<u64> {
        // Validate before mutating anything: a failed batch must not
        // partially apply.
        for update in updates {
            if let SuggestionUpdate::Modify { id, .. } | SuggestionUpdate::Remove { id } = update {
                if !self.entries.contains_key(id) {
                    return Err(RuntimeError::SuggestionNotFound(*id));
                }
            }
        }

        let mut changed = false;

        if let Some(ModuleUpdateAction::CleanModule { module: target }) = action {
            let to_remove: Vec<SuggestionEntryId> =
                self.entries.iter().filter(|(_, entry)| entry.module() == target).map(|(id, _)| *id).collect();
            for id in to_remove {
                self.remove_entry(id);
                changed = true;
            }
        }

        for update in updates {
            match update {
                SuggestionUpdate::Add { id, entry } => {
                    if self.structural.contains_key(&entry.structural_key()) {
                        // Already indexed under this structural identity; a
                        // duplicate Add is a no-op rather than a second
                        // entry.
                        continue;
                    }
                    self.insert_entry(*id, entry.clone());
                    self.next_id = self.next_id.max(*id + 1);
                    changed = true;
                }
                SuggestionUpdate::Remove { id } => {
                    if self.remove_entry(*id).is_some() {
                        changed = true;
                    }
                }
                SuggestionUpdate::Modify { id, fields } => {
                    if fields.is_noop() {
                        continue;
                    }
                    let entry = self.entries.get_mut(id).expect("existence checked above");
                    let before = entry.clone();
                    let old_key = entry.structural_key();
                    apply_field_updates(entry, fields);
                    if *entry != before {
                        changed = true;
                        let new_key = entry.structural_key();
                        if new_key != old_key {
                            self.structural.remove(&old_key);
                            self.structural.insert(new_key, *id);
                        }
                    }
                }
            }
        }

        let _ = module;
        if changed {
            self.version += 1;
        }
        Ok(self.version)
    }

    fn insert_entry(&mut self, id: SuggestionEntryId, entry: SuggestionEntry) {
        self.structural.insert(entry.structural_key(), id);
        self.entries.insert(id, entry);
    }

    fn remove_entry(&mut self, id: SuggestionEntryId) -> Option<SuggestionEntry> {
        let entry = self.entries.remove(&id)?;
        self.structural.remove(&entry.structural_key());
        Some(entry)
    }

    /// Add a brand-new entry outside of the module-update batch protocol
    /// (used by tests and by initial database population from compilation
    /// output). Returns the allocated id.
    pub fn add(&mut self, entry: SuggestionEntry) -> SuggestionEntryId {
        let id = self.allocate_id();
        self.insert_entry(id, entry);
        self.version += 1;
        id
    }

    /// Rewrite every `old.`-prefixed module/type-name string in the index
    /// to `new.`-prefixed. Returns the ids changed per field category.
    /// Advances the version exactly once if any id changed at all.
    pub fn rename_project(&mut self, old: &str, new: &str) -> RenameReport {
        let old_prefix = format!("{old}.");
        let new_prefix = format!("{new}.");
        let mut report = RenameReport::default();
        for (id, entry) in self.entries.iter_mut() {
            let old_key = entry.structural_key();
            let renamed = entry.rename_project(&old_prefix, &new_prefix);
            if renamed.module {
                report.module.push(*id);
            }
            if renamed.self_type {
                report.self_type.push(*id);
            }
            if renamed.return_type {
                report.return_type.push(*id);
            }
            if renamed.argument_type {
                report.argument_type.push(*id);
            }
            if renamed.any() {
                self.structural.remove(&old_key);
                self.structural.insert(entry.structural_key(), *id);
            }
        }
        if report.any_changed() {
            self.version += 1;
        }
        report
    }

    /// Apply a batch of export-annotation edges. For each edge, matches
    /// entries defined in the symbol's defining module whose current
    /// `reexport` is either absent or equal to the edge's reexporting
    /// module (a "proper" match — the index never stacks two distinct
    /// re-export annotations on one entry), and sets or clears the
    /// annotation accordingly. Edges whose `reexporting_module` is a
    /// strictly longer string than the symbol's defining module are
    /// rejected outright (no ids change) — this is the guard against
    /// nested re-export misattribution.
    pub fn apply_exports(&mut self, edges: &[ExportEdge]) -> Vec<SuggestionEntryId> {
        let mut changed_ids = Vec::new();
        for edge in edges {
            let defining_module = edge.symbol.defining_module();
            if edge.reexporting_module.len() > defining_module.len() {
                continue;
            }
            for (id, entry) in self.entries.iter_mut() {
                if entry.module() != defining_module {
                    continue;
                }
                if !symbol_matches(entry, &edge.symbol) {
                    continue;
                }
                let matches_current = match entry.reexport() {
                    None => true,
                    Some(current) => current == edge.reexporting_module,
                };
                if !matches_current {
                    continue;
                }
                let new_value = if edge.remove { None } else { Some(edge.reexporting_module.clone()) };
                if entry.reexport().map(str::to_string) != new_value {
                    entry.set_reexport(new_value);
                    changed_ids.push(*id);
                }
            }
        }
        if !changed_ids.is_empty() {
            self.version += 1;
        }
        changed_ids
    }

    /// Rewrite the return type of entries named by their stable compiler
    /// `external_id` (distinct from the index's own [`SuggestionEntryId`]),
    /// returning the ids actually changed. An `external_id` with no matching
    /// entry is silently skipped: the compiler may describe updates for
    /// entries this index has not been told about yet.
    pub fn update_by_external_id(&mut self, updates: &[(ExternalId, String)]) -> Vec<SuggestionEntryId> {
        let mut changed = Vec::new();
        for (external_id, new_return_type) in updates {
            let found = self.entries.iter_mut().find(|(_, entry)| entry.external_id() == Some(*external_id));
            if let Some((id, entry)) = found {
                if entry.return_type() != Some(new_return_type.as_str()) && entry.set_return_type(new_return_type.clone()) {
                    changed.push(*id);
                }
            }
        }
        if !changed.is_empty() {
            self.version += 1;
        }
        changed
    }

    /// Search the index against a filter. Results are ordered by
    /// self-type-match specificity (an exact self-type match before a less
    /// specific one), then by ascending id (insertion order, since ids are
    /// allocated monotonically).
    pub fn search(&self, filter: &SearchFilter) -> Vec<SuggestionEntryId> {
        let mut matches: Vec<(Option<usize>, SuggestionEntryId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                if let Some(module) = &filter.module {
                    if !module.is_empty() && entry.module() != module {
                        return false;
                    }
                }
                if let Some(kinds) = &filter.kinds {
                    if !kinds.contains(&kind_of(entry)) {
                        return false;
                    }
                }
                if let Some(self_types) = &filter.self_types {
                    match entry.self_type() {
                        Some(self_type) if self_types.iter().any(|wanted| wanted == self_type) => {}
                        _ => return false,
                    }
                }
                if let Some(return_type) = &filter.return_type {
                    if entry.return_type() != Some(return_type.as_str()) {
                        return false;
                    }
                }
                if let Some(position) = filter.position {
                    if let Some(scope) = entry.scope() {
                        if !scope.contains(position) {
                            return false;
                        }
                    }
                }
                true
            })
            .map(|(id, entry)| {
                let specificity = filter.self_types.as_deref().and_then(|wanted| match_specificity(entry, wanted));
                (specificity, *id)
            })
            .collect();
        matches.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => x.cmp(&y).then(a.1.cmp(&b.1)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });
        matches.into_iter().map(|(_, id)| id).collect()
    }

    /// For each `(module, self_type, name)` triple, the id of the matching
    /// static or instance method, or `None` if no method matches.
    pub fn get_all_methods(&self, triples: &[(String, String, String)]) -> Vec<Option<SuggestionEntryId>> {
        triples
            .iter()
            .map(|(module, self_type, name)| {
                self.entries
                    .iter()
                    .find(|(_, entry)| {
                        matches!(entry, SuggestionEntry::Method { .. })
                            && entry.module() == module
                            && entry.self_type() == Some(self_type.as_str())
                            && entry.name() == Some(name.as_str())
                    })
                    .map(|(id, _)| *id)
            })
            .collect()
    }
}

fn symbol_matches(entry: &SuggestionEntry, symbol: &ExportedSymbol) -> bool {
    match symbol {
        ExportedSymbol::Module { .. } => matches!(entry, SuggestionEntry::Module { .. }),
        ExportedSymbol::Type { name, .. } => {
            matches!(entry, SuggestionEntry::Type { .. }) && entry.name() == Some(name.as_str())
        }
        ExportedSymbol::Constructor { name, .. } => {
            matches!(entry, SuggestionEntry::Constructor { .. }) && entry.name() == Some(name.as_str())
        }
        ExportedSymbol::Method { name, .. } => {
            matches!(entry, SuggestionEntry::Method { .. }) && entry.name() == Some(name.as_str())
        }
    }
}

fn apply_field_updates(entry: &mut SuggestionEntry, fields: &FieldUpdates) {
    let current_external_id = entry.external_id();
    let new_external_id = fields.external_id.apply_to_option(&current_external_id);
    if new_external_id != current_external_id {
        entry.set_external_id(new_external_id);
    }
    if let FieldUpdate::Set(value) = &fields.module {
        entry.set_module(value.clone());
    }
    if let FieldUpdate::Set(value) = &fields.self_type {
        entry.set_self_type(value.clone());
    }
    match &fields.return_type {
        FieldUpdate::Set(value) => {
            entry.set_return_type(value.clone());
        }
        FieldUpdate::Remove | FieldUpdate::NoChange => {}
    }
    let current_doc = entry_documentation(entry);
    let new_doc = fields.documentation.apply_to_option(&current_doc);
    if new_doc != current_doc {
        entry.set_documentation(new_doc);
    }
    if let FieldUpdate::Set(scope) = &fields.scope {
        entry.set_scope(*scope);
    }
    for arg_update in &fields.arguments {
        entry.apply_arg_update(arg_update);
    }
    if let FieldUpdate::Set(value) = &fields.reexport {
        entry.set_reexport(Some(value.clone()));
    } else if let FieldUpdate::Remove = &fields.reexport {
        entry.set_reexport(None);
    }
}

fn entry_documentation(entry: &SuggestionEntry) -> Option<String> {
    match entry {
        SuggestionEntry::Module { documentation, .. }
        | SuggestionEntry::Type { documentation, .. }
        | SuggestionEntry::Constructor { documentation, .. }
        | SuggestionEntry::Method { documentation, .. }
        | SuggestionEntry::Conversion { documentation, .. }
        | SuggestionEntry::Function { documentation, .. }
        | SuggestionEntry::Local { documentation, .. } => documentation.clone(),
    }
}

/// Which ids changed, broken down by field category, from a
/// [`SuggestionsIndex::rename_project`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub module: Vec<SuggestionEntryId>,
    pub self_type: Vec<SuggestionEntryId>,
    pub return_type: Vec<SuggestionEntryId>,
    pub argument_type: Vec<SuggestionEntryId>,
}

impl RenameReport {
    fn any_changed(&self) -> bool {
        !self.module.is_empty() || !self.self_type.is_empty() || !self.return_type.is_empty() || !self.argument_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(module: &str, defined_on_type: &str, name: &str) -> SuggestionEntry {
        SuggestionEntry::Method {
            module: module.into(),
            name: name.into(),
            defined_on_type: defined_on_type.into(),
            is_static: false,
            arguments: vec![],
            return_type: "Any".into(),
            documentation: None,
            reexport: None,
            external_id: None,
        }
    }

    #[test]
    fn add_then_duplicate_add_is_noop() {
        let mut index = SuggestionsIndex::new();
        let entry = method("Main", "Main.Widget", "draw");
        let id = index.add(entry.clone());
        let version_before = index.current_version();
        let update = SuggestionUpdate::Add { id: id + 1, entry };
        let version_after = index.apply_module_update("Main", None, &[update]).unwrap();
        assert_eq!(version_before, version_after);
        assert!(index.get(id + 1).is_none());
    }

    #[test]
    fn noop_modify_does_not_advance_version() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let version_before = index.current_version();
        let update = SuggestionUpdate::Modify { id, fields: FieldUpdates::default() };
        let version_after = index.apply_module_update("Main", None, &[update]).unwrap();
        assert_eq!(version_before, version_after);
    }

    #[test]
    fn effective_modify_advances_version() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let version_before = index.current_version();
        let update =
            SuggestionUpdate::Modify { id, fields: FieldUpdates { return_type: FieldUpdate::Set("Number".into()), ..Default::default() } };
        let version_after = index.apply_module_update("Main", None, &[update]).unwrap();
        assert!(version_after > version_before);
        assert_eq!(index.get(id).unwrap().return_type(), Some("Number"));
    }

    #[test]
    fn search_kinds_empty_matches_nothing() {
        let mut index = SuggestionsIndex::new();
        index.add(method("Main", "Main.Widget", "draw"));
        let filter = SearchFilter { kinds: Some(vec![]), ..Default::default() };
        assert!(index.search(&filter).is_empty());
    }

    #[test]
    fn search_kinds_absent_does_not_filter() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let filter = SearchFilter::default();
        assert_eq!(index.search(&filter), vec![id]);
    }

    #[test]
    fn apply_exports_rejects_strictly_longer_exporter() {
        let mut index = SuggestionsIndex::new();
        index.add(method("Main", "Main.Widget", "draw"));
        let edge = ExportEdge {
            reexporting_module: "Main.Deeply.Nested.Exporter".into(),
            symbol: ExportedSymbol::Method { module: "Main".into(), name: "draw".into() },
            remove: false,
        };
        let changed = index.apply_exports(&[edge]);
        assert!(changed.is_empty());
    }

    #[test]
    fn apply_exports_adds_then_removes_annotation() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let edge = ExportEdge {
            reexporting_module: "Ma".into(),
            symbol: ExportedSymbol::Method { module: "Main".into(), name: "draw".into() },
            remove: false,
        };
        let changed = index.apply_exports(&[edge.clone()]);
        assert_eq!(changed, vec![id]);
        assert_eq!(index.get(id).unwrap().reexport(), Some("Ma"));
        let remove_edge = ExportEdge { remove: true, ..edge };
        let changed = index.apply_exports(&[remove_edge]);
        assert_eq!(changed, vec![id]);
        assert_eq!(index.get(id).unwrap().reexport(), None);
    }

    #[test]
    fn rename_project_advances_version_once_and_rewrites_search_results() {
        let mut index = SuggestionsIndex::new();
        index.add(method("Test.Main", "Test.Main.Widget", "draw"));
        let version_before = index.current_version();
        let report = index.rename_project("Test", "Best");
        assert!(report.any_changed());
        assert_eq!(index.current_version(), version_before + 1);
        let found_new = index.search(&SearchFilter { module: Some("Best.Main".into()), ..Default::default() });
        assert_eq!(found_new.len(), 1);
        let found_old = index.search(&SearchFilter { module: Some("Test.Main".into()), ..Default::default() });
        assert!(found_old.is_empty());
    }

    #[test]
    fn get_all_methods_returns_none_for_unmatched_triple() {
        let mut index = SuggestionsIndex::new();
        index.add(method("Main", "Main.Widget", "draw"));
        let triples = vec![
            ("Main".to_string(), "Main.Widget".to_string(), "draw".to_string()),
            ("Main".to_string(), "Main.Widget".to_string(), "missing".to_string()),
        ];
        let result = index.get_all_methods(&triples);
        assert!(result[0].is_some());
        assert!(result[1].is_none());
    }

    #[test]
    fn modify_module_and_self_type_reindexes_structural_key() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let update = SuggestionUpdate::Modify {
            id,
            fields: FieldUpdates {
                module: FieldUpdate::Set("Other".into()),
                self_type: FieldUpdate::Set("Other.Widget".into()),
                ..Default::default()
            },
        };
        index.apply_module_update("Main", None, &[update]).unwrap();
        assert_eq!(index.get(id).unwrap().module(), "Other");
        assert_eq!(index.get(id).unwrap().self_type(), Some("Other.Widget"));
        let found = index.search(&SearchFilter { module: Some("Other".into()), ..Default::default() });
        assert_eq!(found, vec![id]);
    }

    #[test]
    fn modify_external_id_is_applied() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let external_id = ExternalId::from_u128(42);
        let update =
            SuggestionUpdate::Modify { id, fields: FieldUpdates { external_id: FieldUpdate::Set(external_id), ..Default::default() } };
        index.apply_module_update("Main", None, &[update]).unwrap();
        assert_eq!(index.get(id).unwrap().external_id(), Some(external_id));
    }

    #[test]
    fn modify_arguments_add_and_remove_change_arity() {
        let mut index = SuggestionsIndex::new();
        let id = index.add(method("Main", "Main.Widget", "draw"));
        let add = ArgUpdate::Add {
            index: 0,
            argument: Argument {
                name: "color".into(),
                repr_type: "Text".into(),
                is_suspended: false,
                has_default: false,
                default_value: None,
            },
        };
        let update = SuggestionUpdate::Modify { id, fields: FieldUpdates { arguments: vec![add], ..Default::default() } };
        index.apply_module_update("Main", None, &[update]).unwrap();
        assert_eq!(index.get(id).unwrap().arguments().map(Vec::len), Some(1));

        let remove = ArgUpdate::Remove { index: 0 };
        let update = SuggestionUpdate::Modify { id, fields: FieldUpdates { arguments: vec![remove], ..Default::default() } };
        index.apply_module_update("Main", None, &[update]).unwrap();
        assert_eq!(index.get(id).unwrap().arguments().map(Vec::len), Some(0));
    }

    #[test]
    fn update_by_external_id_finds_entry_independent_of_suggestion_id() {
        let mut index = SuggestionsIndex::new();
        let external_id = ExternalId::from_u128(7);
        let mut entry = method("Main", "Main.Widget", "draw");
        entry.set_external_id(Some(external_id));
        let id = index.add(entry);
        let changed = index.update_by_external_id(&[(external_id, "Number".into())]);
        assert_eq!(changed, vec![id]);
        assert_eq!(index.get(id).unwrap().return_type(), Some("Number"));
    }

    #[test]
    fn update_by_external_id_skips_unknown_id() {
        let mut index = SuggestionsIndex::new();
        index.add(method("Main", "Main.Widget", "draw"));
        let unknown = ExternalId::from_u128(999);
        let changed = index.update_by_external_id(&[(unknown, "Number".into())]);
        assert!(changed.is_empty());
    }
}
