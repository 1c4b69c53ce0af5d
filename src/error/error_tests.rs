use super::*;
use uuid::Uuid;

#[test]
fn http_status_mapping() {
    assert_eq!(FsError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(FsError::already_exists("already_exists", "dup").http_status(), 409);
    assert_eq!(FsError::not_empty("not_empty", "kids").http_status(), 409);
    assert_eq!(FsError::invalid("invalid_operation", "root").http_status(), 400);
    assert_eq!(FsError::store("store_error", "down").http_status(), 503);
    assert_eq!(FsError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn store_errors_map_to_taxonomy() {
    let e: FsError = StoreError::Conflict { path: "/a/c".into() }.into();
    assert!(e.is_already_exists());
    assert!(e.message().contains("/a/c"));

    let e: FsError = StoreError::Missing { kind: "folder", id: Uuid::nil() }.into();
    assert!(e.is_not_found());

    let e: FsError = StoreError::Backend("disk full".into()).into();
    assert_eq!(e.code_str(), "store_error");
}

#[test]
fn serializes_with_type_tag() {
    let e = FsError::not_empty("not_empty", "Folder /a not empty");
    let v = serde_json::to_value(&e).unwrap();
    assert_eq!(v["type"], "not_empty");
    assert_eq!(v["code"], "not_empty");
    assert_eq!(v["message"], "Folder /a not empty");
    assert_eq!(e.to_string(), "not_empty: Folder /a not empty");
}
