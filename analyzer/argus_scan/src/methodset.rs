//! Method sets, embedded-field promotion, and interface satisfaction.
//!
//! Method lookup walks a type's declared methods first, then its
//! embedded struct fields, cycle-guarded across the embedding graph.
//! A method declared on `*T` is only found when the receiver is
//! addressable (or reached through a pointer-embedded field); the
//! search then continues into embedded fields, mirroring Go's method
//! set rules closely enough for dispatch tracing.
//!
//! Looking up methods requires declarations of the defining package.
//! This module therefore scans packages *regardless of scan policy* —
//! an intentional, documented policy bypass: the policy governs deep
//! body walking, not signature visibility. Types that resolve to
//! unresolved placeholders still short-circuit the walk.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::entity::{FuncSigInfo, FunctionInfo, MethodSpec, TypeInfo, TypeKind};
use crate::session::Session;

/// Outcome of a method search over a concrete type.
#[derive(Debug, Clone)]
pub enum MethodLookup {
    Found(Arc<FunctionInfo>),
    /// The search crossed an embedded type that could not be resolved
    /// (out of policy or missing); the method may exist there.
    UnresolvedEmbedded { embedded: Arc<TypeInfo> },
    NotFound,
}

/// Find `name` on `info`, following embedded struct fields.
pub fn find_method(
    session: &Session,
    info: &Arc<TypeInfo>,
    name: &str,
    addressable: bool,
) -> MethodLookup {
    let mut visited = FxHashSet::default();
    find_method_rec(session, info, name, addressable, &mut visited)
}

fn find_method_rec(
    session: &Session,
    info: &Arc<TypeInfo>,
    name: &str,
    addressable: bool,
    visited: &mut FxHashSet<(String, String)>,
) -> MethodLookup {
    if !visited.insert((info.pkg_path.clone(), info.name.clone())) {
        return MethodLookup::NotFound;
    }
    if info.unresolved {
        return MethodLookup::UnresolvedEmbedded {
            embedded: Arc::clone(info),
        };
    }

    // Declared methods of the named type itself.
    if let Ok(pkg) = session.scan_package_by_import(&info.pkg_path) {
        if let Some(func) = pkg.method(&info.name, name) {
            let pointer_receiver = func
                .receiver
                .as_ref()
                .is_some_and(|recv| recv.ty.is_pointer());
            if !pointer_receiver || addressable {
                return MethodLookup::Found(Arc::clone(func));
            }
            // `*T` method on a non-addressable value: skip, keep
            // searching embedded fields.
        }
    }

    // `type B = A` forwards to A's method set.
    if info.is_alias {
        if let Some(underlying) = &info.underlying {
            let target = session.resolve_type(underlying);
            if !target.unresolved {
                return find_method_rec(session, &target, name, addressable, visited);
            }
        }
    }

    let Some(struct_info) = &info.struct_info else {
        return MethodLookup::NotFound;
    };

    let mut unresolved_hit: Option<Arc<TypeInfo>> = None;
    for field in &struct_info.fields {
        if !field.embedded {
            continue;
        }
        let embedded = session.resolve_type(&field.ty);
        if embedded.unresolved {
            unresolved_hit.get_or_insert(embedded);
            continue;
        }
        // Reaching a method through a pointer-embedded field makes the
        // receiver addressable.
        let embedded_addressable = addressable || field.ty.is_pointer();
        match find_method_rec(session, &embedded, name, embedded_addressable, visited) {
            MethodLookup::NotFound => {}
            MethodLookup::UnresolvedEmbedded { embedded } => {
                unresolved_hit.get_or_insert(embedded);
            }
            found @ MethodLookup::Found(_) => return found,
        }
    }

    match unresolved_hit {
        Some(embedded) => MethodLookup::UnresolvedEmbedded { embedded },
        None => MethodLookup::NotFound,
    }
}

/// The transitive method set of an interface, including embedded
/// interfaces, cycle-guarded. Union terms contribute no methods.
pub fn interface_method_set(session: &Session, info: &Arc<TypeInfo>) -> Vec<MethodSpec> {
    let mut out = Vec::new();
    let mut seen_names = FxHashSet::default();
    let mut visited = FxHashSet::default();
    collect_interface_methods(session, info, &mut out, &mut seen_names, &mut visited);
    out
}

fn collect_interface_methods(
    session: &Session,
    info: &Arc<TypeInfo>,
    out: &mut Vec<MethodSpec>,
    seen_names: &mut FxHashSet<String>,
    visited: &mut FxHashSet<(String, String)>,
) {
    if !visited.insert((info.pkg_path.clone(), info.name.clone())) {
        return;
    }
    let Some(iface) = &info.interface_info else {
        return;
    };
    for method in &iface.methods {
        if seen_names.insert(method.name.clone()) {
            out.push(method.clone());
        }
    }
    for embedded in &iface.embedded {
        let resolved = session.resolve_type(embedded);
        if !resolved.unresolved {
            collect_interface_methods(session, &resolved, out, seen_names, visited);
        }
    }
}

/// A single interface method by name, searched transitively.
pub fn interface_method(
    session: &Session,
    info: &Arc<TypeInfo>,
    name: &str,
) -> Option<MethodSpec> {
    interface_method_set(session, info)
        .into_iter()
        .find(|m| m.name == name)
}

/// Does `concrete` satisfy `iface`?
///
/// Every method of the interface's transitive set must be found on the
/// concrete type with an equal signature (compared by the `Display`
/// rendering of each parameter and result type). `addressable`
/// controls whether `*T` methods count.
pub fn implements(
    session: &Session,
    concrete: &Arc<TypeInfo>,
    iface: &Arc<TypeInfo>,
    addressable: bool,
) -> bool {
    if iface.kind != TypeKind::Interface {
        return false;
    }
    for wanted in interface_method_set(session, iface) {
        match find_method(session, concrete, &wanted.name, addressable) {
            MethodLookup::Found(func) => {
                if !signatures_match(&wanted.sig, &func.params, &func.results, func.variadic) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

fn signatures_match(
    wanted: &FuncSigInfo,
    params: &[crate::entity::ParamInfo],
    results: &[crate::entity::ParamInfo],
    variadic: bool,
) -> bool {
    if wanted.params.len() != params.len()
        || wanted.results.len() != results.len()
        || wanted.variadic != variadic
    {
        return false;
    }
    let same = |a: &crate::entity::ParamInfo, b: &crate::entity::ParamInfo| {
        a.ty.to_string() == b.ty.to_string()
    };
    wanted.params.iter().zip(params).all(|(a, b)| same(a, b))
        && wanted.results.iter().zip(results).all(|(a, b)| same(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Overlay;
    use pretty_assertions::assert_eq;

    fn session_with(files: &[(&str, &str)]) -> Session {
        let mut overlay = Overlay::new();
        overlay.add("/m/go.mod", "module example.com/m\n");
        for (path, src) in files {
            overlay.add(*path, (*src).to_string());
        }
        Session::builder("/m")
            .overlay(overlay)
            .policy(|path| !path.contains("/ext"))
            .build()
            .unwrap()
    }

    fn type_of(session: &Session, pkg: &str, name: &str) -> Arc<TypeInfo> {
        let pkg = session.scan_package_by_import(pkg).unwrap();
        Arc::clone(pkg.lookup_type(name).unwrap())
    }

    #[test]
    fn test_find_method_directly_and_via_embedding() {
        let session = session_with(&[(
            "/m/a/a.go",
            "package a\n\ntype Base struct{}\n\nfunc (b Base) Ping() string { return \"pong\" }\n\ntype Wrapper struct {\n\tBase\n}\n",
        )]);
        let wrapper = type_of(&session, "example.com/m/a", "Wrapper");
        let MethodLookup::Found(func) = find_method(&session, &wrapper, "Ping", false) else {
            panic!("expected Ping via embedded Base");
        };
        assert_eq!(func.name, "Ping");
        assert!(matches!(
            find_method(&session, &wrapper, "Missing", false),
            MethodLookup::NotFound
        ));
    }

    #[test]
    fn test_pointer_receiver_requires_addressable() {
        let session = session_with(&[(
            "/m/a/a.go",
            "package a\n\ntype Counter struct{ n int }\n\nfunc (c *Counter) Inc() { c.n++ }\n",
        )]);
        let counter = type_of(&session, "example.com/m/a", "Counter");
        assert!(matches!(
            find_method(&session, &counter, "Inc", false),
            MethodLookup::NotFound
        ));
        assert!(matches!(
            find_method(&session, &counter, "Inc", true),
            MethodLookup::Found(_)
        ));
    }

    #[test]
    fn test_embedding_cycle_terminates() {
        let session = session_with(&[(
            "/m/a/a.go",
            "package a\n\ntype A struct{ *B }\n\ntype B struct{ *A }\n",
        )]);
        let a = type_of(&session, "example.com/m/a", "A");
        assert!(matches!(
            find_method(&session, &a, "Nope", false),
            MethodLookup::NotFound
        ));
    }

    #[test]
    fn test_unresolved_embedded_reported() {
        let session = session_with(&[(
            "/m/cli/cli.go",
            "package cli\n\nimport \"example.com/m/ext\"\n\ntype Application struct {\n\t*ext.Application\n}\n",
        )]);
        let app = type_of(&session, "example.com/m/cli", "Application");
        let MethodLookup::UnresolvedEmbedded { embedded } =
            find_method(&session, &app, "Run", true)
        else {
            panic!("expected unresolved embedded report");
        };
        assert!(embedded.unresolved);
        assert_eq!(embedded.pkg_path, "example.com/m/ext");
    }

    #[test]
    fn test_implements_with_embedded_interface() {
        let session = session_with(&[(
            "/m/a/a.go",
            concat!(
                "package a\n\n",
                "type Named interface {\n\tName() string\n}\n\n",
                "type Walker interface {\n\tNamed\n\tWalk(dist int) error\n}\n\n",
                "type Person struct{}\n\n",
                "func (p Person) Name() string { return \"\" }\n\n",
                "func (p Person) Walk(dist int) error { return nil }\n\n",
                "type Rock struct{}\n\n",
                "func (r Rock) Name() string { return \"rock\" }\n",
            ),
        )]);
        let walker = type_of(&session, "example.com/m/a", "Walker");
        let person = type_of(&session, "example.com/m/a", "Person");
        let rock = type_of(&session, "example.com/m/a", "Rock");
        assert_eq!(interface_method_set(&session, &walker).len(), 2);
        assert!(implements(&session, &person, &walker, false));
        assert!(!implements(&session, &rock, &walker, false));
    }

    #[test]
    fn test_implements_respects_pointer_receiver_rule() {
        let session = session_with(&[(
            "/m/a/a.go",
            concat!(
                "package a\n\n",
                "type Closer interface {\n\tClose() error\n}\n\n",
                "type File struct{}\n\n",
                "func (f *File) Close() error { return nil }\n",
            ),
        )]);
        let closer = type_of(&session, "example.com/m/a", "Closer");
        let file = type_of(&session, "example.com/m/a", "File");
        assert!(!implements(&session, &file, &closer, false));
        assert!(implements(&session, &file, &closer, true));
    }
}
