//! Path resolution.
//!
//! A path is walked from the scope root one component at a time. The result
//! is the whole chain `root..=target`, so callers can check execute on every
//! ancestor before touching the target.

use std::sync::Arc;

use quire_types::{Principal, TenantId};

use crate::db::FsDb;
use crate::error::{FsError, FsResult};
use crate::model::{Inode, PATHSEP};
use crate::permissions;

/// The part of the hierarchy a lookup may see: one tenant's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub tenant: TenantId,
}

impl Scope {
    pub fn tenant(tenant: TenantId) -> Self {
        Self { tenant }
    }
}

impl From<&Principal> for Scope {
    fn from(principal: &Principal) -> Self {
        Scope::tenant(principal.tenant)
    }
}

/// Split a path into components, folding `.`, `..` and repeated separators.
///
/// `..` at the root stays at the root.
pub fn normalize(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for part in path.split(PATHSEP) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    parts
}

/// Render components as an absolute path.
pub fn join(parts: &[&str]) -> String {
    if parts.is_empty() {
        return PATHSEP.to_string();
    }
    let mut out = String::new();
    for part in parts {
        out.push(PATHSEP);
        out.push_str(part);
    }
    out
}

/// Path of a child named `name` below `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with(PATHSEP) {
        format!("{parent}{name}")
    } else {
        format!("{parent}{PATHSEP}{name}")
    }
}

/// A successful resolution: the scope root first, the target last.
#[derive(Debug, Clone)]
pub struct Resolved {
    chain: Vec<Inode>,
}

impl Resolved {
    pub fn new(chain: Vec<Inode>) -> Self {
        debug_assert!(!chain.is_empty());
        Self { chain }
    }

    pub fn chain(&self) -> &[Inode] {
        &self.chain
    }

    pub fn target(&self) -> &Inode {
        // The chain always holds at least the root
        &self.chain[self.chain.len() - 1]
    }

    pub fn into_target(mut self) -> Inode {
        let last = self.chain.len() - 1;
        self.chain.swap_remove(last)
    }

    /// Everything above the target.
    pub fn ancestors(&self) -> &[Inode] {
        &self.chain[..self.chain.len() - 1]
    }

    /// Absolute path of the target. The root's own name is not part of it.
    pub fn path(&self) -> String {
        self.prefix(self.chain.len())
    }

    /// Path of the target's directory; the root is its own parent.
    pub fn parent_path(&self) -> String {
        self.prefix(self.chain.len().saturating_sub(1))
    }

    /// Path of the first `len` nodes of the chain.
    fn prefix(&self, len: usize) -> String {
        let names: Vec<&str> = self.chain[1..len.max(1)]
            .iter()
            .map(|inode| inode.name.as_str())
            .collect();
        join(&names)
    }

    /// Require execute on every ancestor.
    pub fn check_traverse(&self, principal: &Principal) -> FsResult<()> {
        for (depth, inode) in self.ancestors().iter().enumerate() {
            if !permissions::can_execute(inode, principal) {
                return Err(FsError::not_executable(self.prefix(depth + 1)));
            }
        }
        Ok(())
    }
}

/// Walks paths against the metadata store.
#[derive(Clone)]
pub struct PathResolver {
    db: Arc<FsDb>,
}

impl PathResolver {
    pub fn new(db: Arc<FsDb>) -> Self {
        Self { db }
    }

    /// Root directory of a scope.
    pub fn root(&self, scope: Scope) -> FsResult<Inode> {
        self.db
            .scope_root(scope.tenant)?
            .ok_or_else(|| FsError::no_such_node(PATHSEP.to_string()))
    }

    /// Resolve `path` within `scope`.
    ///
    /// Fails with `NoSuchNode(prefix)` naming the first missing component, or
    /// `NotADirectory(prefix)` naming the file that was used as a directory.
    /// An empty path resolves to the scope root. No permissions are checked.
    pub fn resolve(&self, path: &str, scope: Scope) -> FsResult<Resolved> {
        self.walk(path, scope, None)
    }

    /// Resolve `path` as `principal`: every directory must grant execute
    /// before its children are looked up. A blocked directory fails with
    /// `NotExecutable(prefix)` whether or not the rest of the path exists.
    pub fn resolve_as(&self, path: &str, scope: Scope, principal: &Principal) -> FsResult<Resolved> {
        self.walk(path, scope, Some(principal))
    }

    fn walk(&self, path: &str, scope: Scope, principal: Option<&Principal>) -> FsResult<Resolved> {
        let parts = normalize(path);
        let mut chain = vec![self.root(scope)?];

        for (depth, name) in parts.iter().enumerate() {
            let current = &chain[chain.len() - 1];
            if !current.is_dir() {
                return Err(FsError::not_a_directory(join(&parts[..depth])));
            }
            if let Some(principal) = principal {
                if !permissions::can_execute(current, principal) {
                    return Err(FsError::not_executable(join(&parts[..depth])));
                }
            }
            match self.db.child(current.id, name)? {
                Some(child) => chain.push(child),
                None => return Err(FsError::no_such_node(join(&parts[..=depth]))),
            }
        }

        Ok(Resolved::new(chain))
    }

    /// Chain from the root down to an inode reached by id.
    pub fn chain_of(&self, inode: Inode) -> FsResult<Resolved> {
        let mut chain = vec![inode];
        while let Some(parent) = chain[chain.len() - 1].parent {
            let node = self
                .db
                .get_inode(parent)?
                .ok_or_else(|| FsError::no_such_node(format!("inode {parent}")))?;
            chain.push(node);
        }
        chain.reverse();
        Ok(Resolved::new(chain))
    }

    /// Absolute path of an inode.
    pub fn path_of(&self, inode: &Inode) -> FsResult<String> {
        Ok(self.chain_of(inode.clone())?.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_types::{AccountId, ContentId, FileMode};

    const OWNER: AccountId = AccountId::new(1);
    const TENANT: TenantId = TenantId::new(1);

    struct Tree {
        resolver: PathResolver,
        db: Arc<FsDb>,
        root: Inode,
    }

    impl Tree {
        fn new() -> Self {
            let db = Arc::new(FsDb::in_memory().unwrap());
            let root = db
                .insert_inode(None, "root", OWNER, TENANT, FileMode::DIRECTORY, None)
                .unwrap();
            Self {
                resolver: PathResolver::new(db.clone()),
                db,
                root,
            }
        }

        fn dir(&self, parent: &Inode, name: &str, mode: u16) -> Inode {
            self.db
                .insert_inode(Some(parent.id), name, OWNER, TENANT, FileMode::new(mode), None)
                .unwrap()
        }

        fn file(&self, parent: &Inode, name: &str) -> Inode {
            self.db
                .insert_inode(
                    Some(parent.id),
                    name,
                    OWNER,
                    TENANT,
                    FileMode::FILE,
                    Some(ContentId::new(1)),
                )
                .unwrap()
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a//b/./c/"), vec!["a", "b", "c"]);
        assert_eq!(normalize("a/b/../c"), vec!["a", "c"]);
        assert_eq!(normalize("/../.."), Vec::<&str>::new());
        assert_eq!(normalize(""), Vec::<&str>::new());
        assert_eq!(join(&[]), "/");
        assert_eq!(join(&["a", "b"]), "/a/b");
        assert_eq!(child_path("/", "a"), "/a");
        assert_eq!(child_path("/a", "b"), "/a/b");
    }

    #[test]
    fn test_resolve_chain() {
        let tree = Tree::new();
        let a = tree.dir(&tree.root, "a", 0o755);
        let b = tree.dir(&a, "b", 0o755);
        let scope = Scope::tenant(TENANT);

        let resolved = tree.resolver.resolve("/a/b", scope).unwrap();
        let ids: Vec<_> = resolved.chain().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![tree.root.id, a.id, b.id]);
        assert_eq!(resolved.path(), "/a/b");
        assert_eq!(resolved.parent_path(), "/a");

        let root = tree.resolver.resolve("", scope).unwrap();
        assert_eq!(root.target().id, tree.root.id);
        assert_eq!(root.path(), "/");
    }

    #[test]
    fn test_missing_component() {
        let tree = Tree::new();
        tree.dir(&tree.root, "a", 0o755);
        let err = tree
            .resolver
            .resolve("/a/x/y", Scope::tenant(TENANT))
            .unwrap_err();
        assert!(matches!(err, FsError::NoSuchNode(p) if p == "/a/x"));
    }

    #[test]
    fn test_file_used_as_directory() {
        let tree = Tree::new();
        tree.file(&tree.root, "a");
        let err = tree
            .resolver
            .resolve("/a/b/c", Scope::tenant(TENANT))
            .unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(p) if p == "/a"));
    }

    #[test]
    fn test_unknown_scope() {
        let tree = Tree::new();
        let err = tree
            .resolver
            .resolve("/", Scope::tenant(TenantId::new(99)))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_path_round_trip() {
        let tree = Tree::new();
        let a = tree.dir(&tree.root, "a", 0o755);
        let f = tree.file(&a, "notes.txt");

        let path = tree.resolver.path_of(&f).unwrap();
        assert_eq!(path, "/a/notes.txt");
        let again = tree.resolver.resolve(&path, Scope::tenant(TENANT)).unwrap();
        assert_eq!(again.target().id, f.id);
    }

    #[test]
    fn test_traverse_check_names_blocking_ancestor() {
        let tree = Tree::new();
        let a = tree.dir(&tree.root, "a", 0o700);
        tree.dir(&a, "b", 0o755);
        let resolved = tree.resolver.resolve("/a/b", Scope::tenant(TENANT)).unwrap();

        let stranger = Principal::new(AccountId::new(2), TenantId::new(2));
        let err = resolved.check_traverse(&stranger).unwrap_err();
        assert!(matches!(err, FsError::NotExecutable(p) if p == "/a"));

        assert!(resolved.check_traverse(&Principal::new(OWNER, TENANT)).is_ok());
    }

    #[test]
    fn test_resolve_as_stops_at_blocked_directory() {
        let tree = Tree::new();
        let a = tree.dir(&tree.root, "a", 0o700);
        tree.file(&a, "present");
        let scope = Scope::tenant(TENANT);
        let stranger = Principal::new(AccountId::new(2), TenantId::new(2));

        // Existing and missing names below `a` are indistinguishable
        for path in ["/a/present", "/a/missing", "/a/present/deeper"] {
            let err = tree.resolver.resolve_as(path, scope, &stranger).unwrap_err();
            assert!(matches!(err, FsError::NotExecutable(ref p) if p == "/a"), "{path}: {err:?}");
        }

        // The blocked directory itself is reachable
        let target = tree.resolver.resolve_as("/a", scope, &stranger).unwrap();
        assert_eq!(target.target().id, a.id);

        let owner = Principal::new(OWNER, TENANT);
        assert!(matches!(
            tree.resolver.resolve_as("/a/missing", scope, &owner),
            Err(FsError::NoSuchNode(p)) if p == "/a/missing"
        ));
    }

    #[test]
    fn test_resolve_as_blocked_root() {
        let db = Arc::new(FsDb::in_memory().unwrap());
        db.insert_inode(None, "root", OWNER, TENANT, FileMode::new(0o700), None)
            .unwrap();
        let resolver = PathResolver::new(db);
        let peer = Principal::new(AccountId::new(2), TENANT);

        assert!(matches!(
            resolver.resolve_as("/anything", Scope::tenant(TENANT), &peer),
            Err(FsError::NotExecutable(p)) if p == "/"
        ));
    }
}
