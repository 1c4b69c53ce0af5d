use super::*;

#[test]
fn root_is_created_once() {
    let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
    let ns = Namespace::new(store.clone(), Arc::new(MemoryContentStore::new("t")), NamespaceConfig::default());
    assert!(store.is_empty());

    let first = ns.resolve("/").unwrap();
    let second = ns.resolve("/").unwrap();
    match (first, second) {
        (DirEntry::Folder(a), DirEntry::Folder(b)) => assert_eq!(a.id, b.id),
        other => panic!("expected folders, got {:?}", other),
    }
    assert_eq!(store.len(), 1);
    assert_eq!(ns.ensure_root_exists().unwrap().path, "/");
    assert_eq!(store.len(), 1);
}

#[test]
fn duplicate_roots_collapse_to_one() {
    let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
    // Two processes racing on an empty plain store.
    let r1 = store.insert_folder("/").unwrap();
    let r2 = store.insert_folder("/").unwrap();
    let ns = Namespace::new(store.clone(), Arc::new(MemoryContentStore::new("t")), NamespaceConfig::default());
    let root = ns.ensure_root_exists().unwrap();
    assert_eq!(root.id, ns.folders().find("/").unwrap().unwrap().id);
    assert_eq!(store.query_folders(&FolderQuery::PathEq { path: "/".into(), limit: 10 }).unwrap().len(), 1);
    let canonical = [r1, r2].into_iter().min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))).unwrap();
    assert_eq!(root.id, canonical.id);
}

#[test]
fn custom_root_path() {
    let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
    let fx = fixture_with(store, NamespaceConfig::with_root("/srv/media/"));
    assert_eq!(fx.ns.root_path(), "/srv/media");
    fx.ns.create_folder("/srv/media", "img").unwrap();
    assert!(fx.ns.resolve("/srv/media/img").unwrap().is_folder());
    assert!(fx.ns.create_folder("/", "x").unwrap_err().is_not_found());
}

#[test]
fn create_requires_parent_and_free_path() {
    let fx = fixture();
    fx.ns.create_folder("/", "a").unwrap();
    let err = fx.ns.create_folder("/missing", "b").unwrap_err();
    assert!(err.is_not_found());

    let err = fx.ns.create_folder("/", "a").unwrap_err();
    assert!(err.is_already_exists());
    assert!(err.message().contains("/a"));

    fx.ns.create_file("/", "taken", None).unwrap();
    assert!(fx.ns.create_folder("/", "taken").unwrap_err().is_already_exists());
}

#[test]
fn invalid_names_are_rejected() {
    let fx = fixture();
    for bad in ["", "a/b", "..", "."] {
        let err = fx.ns.create_folder("/", bad).unwrap_err();
        assert_eq!(err.code_str(), "invalid_name", "name {:?}", bad);
    }
}

#[test]
fn parent_path_of_nested_and_top_level() {
    let fx = fixture();
    let a = fx.ns.create_folder("/", "a").unwrap();
    let b = fx.ns.create_folder("/a", "b").unwrap();
    assert_eq!(fx.ns.folders().parent_path(&b), "/a");
    assert_eq!(fx.ns.folders().parent_path(&a), "/");
}

#[test]
fn delete_non_empty_then_empty() {
    let fx = fixture();
    fx.ns.create_folder("/", "a").unwrap();
    fx.ns.create_folder("/a", "b").unwrap();
    fx.ns.create_file("/a", "f.txt", None).unwrap();

    let err = fx.ns.delete("/a").unwrap_err();
    assert!(matches!(err, FsError::NotEmpty { .. }));

    fx.ns.delete("/a/b").unwrap();
    assert!(matches!(fx.ns.delete("/a").unwrap_err(), FsError::NotEmpty { .. }));
    fx.ns.delete("/a/f.txt").unwrap();
    fx.ns.delete("/a").unwrap();
    assert!(fx.ns.resolve("/a").unwrap_err().is_not_found());
}

#[test]
fn root_cannot_be_deleted_or_renamed() {
    let fx = fixture();
    assert_eq!(fx.ns.delete("/").unwrap_err().code_str(), "root_delete");
    assert_eq!(fx.ns.rename("/", "x").unwrap_err().code_str(), "root_rename");
}

#[test]
fn rename_moves_descendants_and_files() {
    let fx = fixture();
    fx.ns.create_folder("/", "a").unwrap();
    fx.ns.create_folder("/a", "b").unwrap();
    fx.ns.create_folder("/a/b", "c").unwrap();
    fx.ns.upload("/a/b", "doc.txt", b"hi", Some("text/plain")).unwrap();
    fx.ns.create_folder("/", "ab").unwrap();

    let new_path = fx.ns.rename("/a", "z").unwrap();
    assert_eq!(new_path, "/z");
    assert!(fx.ns.resolve("/a").unwrap_err().is_not_found());
    assert!(fx.ns.resolve("/z/b").unwrap().is_folder());
    assert!(fx.ns.resolve("/z/b/c").unwrap().is_folder());
    let bytes = fx.ns.read_content("/z/b/doc.txt").unwrap().read_all().unwrap();
    assert_eq!(bytes, b"hi");
    // A sibling sharing the name prefix is not a descendant.
    assert!(fx.ns.resolve("/ab").unwrap().is_folder());
    assert_eq!(fx.ns.rename_stats().descendant_failures, 0);
}

#[test]
fn rename_to_same_name_is_noop() {
    let fx = fixture();
    let a = fx.ns.create_folder("/", "a").unwrap();
    assert_eq!(fx.ns.rename("/a", "a").unwrap(), "/a");
    assert_eq!(fx.ns.folders().find("/a").unwrap().unwrap().id, a.id);
}

#[test]
fn rename_updates_modified_at() {
    let fx = fixture();
    let a = fx.ns.create_folder("/", "a").unwrap();
    fx.ns.rename("/a", "b").unwrap();
    let b = fx.ns.folders().find("/b").unwrap().unwrap();
    assert_eq!(b.id, a.id);
    assert_eq!(b.created_at, a.created_at);
    assert!(b.modified_at >= a.modified_at);
}

#[test]
fn listing_pages_through_small_batches() {
    let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
    let fx = fixture_with(store, NamespaceConfig { scan_batch: 2, ..Default::default() });
    for n in ["e", "d", "c", "b", "a"] {
        fx.ns.create_folder("/", n).unwrap();
    }
    fx.ns.create_folder("/a", "deep").unwrap();
    let root = fx.ns.folders().resolve("/").unwrap();
    let names: Vec<String> = fx.ns.folders().list_child_folders(&root).unwrap().into_iter().map(|f| f.path).collect();
    assert_eq!(names, vec!["/a", "/b", "/c", "/d", "/e"]);
    let all: Vec<String> = fx.ns.folders().list_descendants(&root).unwrap().into_iter().map(|f| f.path).collect();
    assert_eq!(all.len(), 6);
}

#[test]
fn has_children_looks_only_below_the_folder() {
    let fx = fixture();
    fx.ns.create_folder("/", "a").unwrap();
    fx.ns.create_folder("/", "ab").unwrap();
    fx.ns.create_folder("/ab", "x").unwrap();
    let a = fx.ns.folders().resolve("/a").unwrap();
    assert!(!fx.ns.folders().has_children(&a).unwrap());

    fx.ns.create_folder("/a", "b").unwrap();
    fx.ns.create_folder("/a/b", "c").unwrap();
    assert!(fx.ns.folders().has_children(&a).unwrap());
    let c = fx.ns.folders().resolve("/a/b/c").unwrap();
    assert!(!fx.ns.folders().has_children(&c).unwrap());

    fx.ns.create_file("/a/b/c", "f.txt", None).unwrap();
    assert!(fx.ns.folders().has_children(&c).unwrap());
    let root = fx.ns.folders().resolve("/").unwrap();
    assert!(fx.ns.folders().has_children(&root).unwrap());
}
