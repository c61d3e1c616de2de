//! The definition arena and scope tree.
//!
//! Definitions live in one `Vec`, addressed by [`DefId`]; the global
//! scope is id 0. Insertion returns whether the name was new in its
//! scope, mirroring how declaration parsers decide between "fresh
//! definition" and "reopen/redeclare".

use std::io::{self, Write};

use declmap_base::{Interner, Symbol};

use crate::definition::{flags, DefId, Definition};

/// Result of a scope insertion.
#[derive(Debug, Clone, Copy)]
pub struct DecResult {
    pub id: DefId,
    /// False when the scope already had the name; `id` is then the
    /// existing definition.
    pub inserted: bool,
}

pub struct DefStore {
    defs: Vec<Definition>,
}

impl DefStore {
    /// Creates a store containing only the global scope.
    pub fn new() -> DefStore {
        let mut global = Definition::new(Symbol::EMPTY, flags::NAMESPACE | flags::SCOPE);
        global.parent = None;
        DefStore { defs: vec![global] }
    }

    pub fn global(&self) -> DefId {
        DefId(0)
    }

    pub fn get(&self, id: DefId) -> &Definition {
        &self.defs[id.index()]
    }

    pub fn get_mut(&mut self, id: DefId) -> &mut Definition {
        &mut self.defs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.len() <= 1
    }

    /// Inserts `def` into `scope` under its own name. When the name is
    /// already taken the existing definition wins and `inserted` is
    /// false.
    pub fn declare(&mut self, scope: DefId, mut def: Definition) -> DecResult {
        if let Some(&existing) = self.defs[scope.index()].members.get(&def.name) {
            return DecResult {
                id: existing,
                inserted: false,
            };
        }
        def.parent = Some(scope);
        let id = DefId(self.defs.len() as u32);
        let name = def.name;
        self.defs.push(def);
        let scope_def = &mut self.defs[scope.index()];
        scope_def.members.insert(name, id);
        scope_def.order.push(id);
        DecResult { id, inserted: true }
    }

    /// Looks `name` up in `scope` only.
    pub fn lookup_local(&self, scope: DefId, name: Symbol) -> Option<DefId> {
        self.defs[scope.index()].members.get(&name).copied()
    }

    /// Looks `name` up in `scope`, then outward through its parents.
    pub fn lookup(&self, scope: DefId, name: Symbol) -> Option<DefId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(found) = self.lookup_local(id, name) {
                return Some(found);
            }
            cur = self.defs[id.index()].parent;
        }
        None
    }

    /// Navigates a `::`-separated qualified name from the global scope.
    /// A leading `::` is accepted and redundant.
    pub fn lookup_qualified(&self, path: &str, interner: &Interner) -> Option<DefId> {
        let mut cur = self.global();
        let trimmed = path.strip_prefix("::").unwrap_or(path);
        if trimmed.is_empty() {
            return Some(cur);
        }
        for part in trimmed.split("::") {
            let sym = interner.get(part)?;
            cur = self.lookup_local(cur, sym)?;
        }
        Some(cur)
    }

    /// The qualified id of a definition, e.g. `::std::string`.
    pub fn qualified_name(&self, id: DefId, interner: &Interner) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            let def = self.get(i);
            if i != self.global() {
                parts.push(interner.resolve(def.name).to_string());
            }
            cur = def.parent;
        }
        parts.reverse();
        format!("::{}", parts.join("::"))
    }

    /// Writes an indented listing of `scope` and everything beneath it.
    pub fn dump(&self, w: &mut dyn Write, interner: &Interner) -> io::Result<()> {
        for &child in &self.get(self.global()).order {
            self.dump_one(w, child, interner, 0)?;
        }
        Ok(())
    }

    fn dump_one(
        &self,
        w: &mut dyn Write,
        id: DefId,
        interner: &Interner,
        indent: usize,
    ) -> io::Result<()> {
        let def = self.get(id);
        let pad = "  ".repeat(indent);
        let name = interner.resolve(def.name);
        if def.has(flags::TEMPLATE) {
            let params: Vec<&str> = def
                .template_params
                .iter()
                .map(|p| interner.resolve(*p))
                .collect();
            writeln!(w, "{}template<{}>", pad, params.join(", "))?;
        }
        if def.is_scope() && !def.has(flags::INCOMPLETE) {
            writeln!(w, "{}{} {} {{", pad, def.kind_word(), name)?;
            for &child in &def.order {
                self.dump_one(w, child, interner, indent + 1)?;
            }
            writeln!(w, "{}}}", pad)?;
            return Ok(());
        }
        match () {
            _ if def.has(flags::INCOMPLETE) => {
                writeln!(w, "{}{} {};", pad, def.kind_word(), name)
            }
            _ if def.has(flags::TYPED) && def.has(flags::TYPENAME) => {
                let ty = def
                    .ty
                    .as_ref()
                    .map(|t| interner.resolve(t.spelling))
                    .unwrap_or("?");
                writeln!(w, "{}typedef {} {};", pad, ty, name)
            }
            _ if def.has(flags::FUNCTION) => {
                let ret = def
                    .ty
                    .as_ref()
                    .map(|t| interner.resolve(t.spelling))
                    .unwrap_or("?");
                let params: Vec<&str> =
                    def.param_types.iter().map(|p| interner.resolve(*p)).collect();
                writeln!(w, "{}{} {}({});", pad, ret, name, params.join(", "))
            }
            _ if def.has(flags::VALUED) => match def.value {
                Some(v) => writeln!(w, "{}{} = {},", pad, name, v),
                None => writeln!(w, "{}{},", pad, name),
            },
            _ if def.has(flags::TYPED) => {
                let ty = def
                    .ty
                    .as_ref()
                    .map(|t| interner.resolve(t.spelling))
                    .unwrap_or("?");
                writeln!(w, "{}{} {};", pad, ty, name)
            }
            _ => writeln!(w, "{}{} {};", pad, def.kind_word(), name),
        }
    }
}

impl Default for DefStore {
    fn default() -> Self {
        DefStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(interner: &mut Interner) -> (DefStore, DefId) {
        let store = DefStore::new();
        let g = store.global();
        let _ = interner;
        (store, g)
    }

    #[test]
    fn declare_and_lookup_local() {
        let mut interner = Interner::new();
        let (mut store, g) = store_with(&mut interner);
        let name = interner.intern("x");
        let res = store.declare(g, Definition::new(name, flags::TYPED));
        assert!(res.inserted);
        assert_eq!(store.lookup_local(g, name), Some(res.id));
    }

    #[test]
    fn duplicate_names_return_existing() {
        let mut interner = Interner::new();
        let (mut store, g) = store_with(&mut interner);
        let name = interner.intern("dup");
        let first = store.declare(g, Definition::new(name, 0));
        let second = store.declare(g, Definition::new(name, 0));
        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(first.id, second.id);
        assert_eq!(store.get(g).order.len(), 1);
    }

    #[test]
    fn lookup_walks_outward() {
        let mut interner = Interner::new();
        let (mut store, g) = store_with(&mut interner);
        let outer = interner.intern("outer");
        let inner = interner.intern("inner");
        let x = interner.intern("x");
        let ns = store
            .declare(g, Definition::new(outer, flags::NAMESPACE | flags::SCOPE))
            .id;
        let cls = store
            .declare(ns, Definition::new(inner, flags::CLASS | flags::SCOPE))
            .id;
        store.declare(g, Definition::new(x, 0));
        // From inside the class, `x` resolves in the global scope.
        assert!(store.lookup(cls, x).is_some());
        assert!(store.lookup_local(cls, x).is_none());
    }

    #[test]
    fn qualified_lookup_and_name() {
        let mut interner = Interner::new();
        let (mut store, g) = store_with(&mut interner);
        let std_sym = interner.intern("std");
        let str_sym = interner.intern("string");
        let ns = store
            .declare(g, Definition::new(std_sym, flags::NAMESPACE | flags::SCOPE))
            .id;
        let s = store
            .declare(
                ns,
                Definition::new(str_sym, flags::CLASS | flags::SCOPE | flags::TYPENAME),
            )
            .id;
        assert_eq!(store.lookup_qualified("std::string", &interner), Some(s));
        assert_eq!(store.lookup_qualified("::std::string", &interner), Some(s));
        assert_eq!(store.lookup_qualified("std::missing", &interner), None);
        assert_eq!(store.qualified_name(s, &interner), "::std::string");
    }

    #[test]
    fn dump_nests_scopes() {
        let mut interner = Interner::new();
        let (mut store, g) = store_with(&mut interner);
        let ns = interner.intern("ns");
        let x = interner.intern("x");
        let scope = store
            .declare(g, Definition::new(ns, flags::NAMESPACE | flags::SCOPE))
            .id;
        let mut var = Definition::new(x, flags::TYPED);
        var.ty = Some(crate::TypeRef {
            base: None,
            spelling: interner.intern("int"),
            ptr_depth: 0,
            is_reference: false,
        });
        store.declare(scope, var);
        let mut out = Vec::new();
        store.dump(&mut out, &interner).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("namespace ns {"));
        assert!(text.contains("  int x;"));
        assert!(text.contains("}"));
    }
}
