//! HTTP adapter tests: run the router on an ephemeral localhost port and drive
//! it with reqwest.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use docfs::server::{router, AppState};
use docfs::storage::{MemoryContentStore, MemoryStore, StoreSettings};
use docfs::{Namespace, NamespaceConfig};

async fn start_ephemeral() -> (JoinHandle<()>, String) {
    let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
    let ns = Namespace::open(store, Arc::new(MemoryContentStore::new("http")), NamespaceConfig::default()).expect("namespace");
    let app = router(AppState::new(Arc::new(ns)));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server task error: {e:?}");
        }
    });
    (handle, format!("http://{}", addr))
}

async fn get_json(client: &reqwest::Client, url: &str) -> (u16, Value) {
    let resp = client.get(url).send().await.expect("request");
    let status = resp.status().as_u16();
    (status, resp.json().await.expect("json body"))
}

#[tokio::test]
async fn file_manager_round_trip() {
    let (handle, base) = start_ephemeral().await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, &format!("{base}/filemanager?mode=addfolder&path=/&name=docs")).await;
    assert_eq!(status, 200);
    assert_eq!(body["reply"], "folder_added");
    assert_eq!(body["path"], "/docs");

    let resp = client
        .post(format!("{base}/filemanager/upload?currentpath=/docs&filename=hello.txt"))
        .header("content-type", "text/plain")
        .body("hello over http")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["path"], "/docs/hello.txt");

    let (status, listing) = get_json(&client, &format!("{base}/filemanager?mode=getfolder&path=/docs")).await;
    assert_eq!(status, 200);
    assert_eq!(listing["entries"].as_array().unwrap().len(), 1);
    assert_eq!(listing["entries"][0]["size"], 15);

    let resp = client.get(format!("{base}/files/docs/hello.txt")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "text/plain");
    assert_eq!(resp.text().await.unwrap(), "hello over http");

    let resp = client.get(format!("{base}/filemanager?mode=download&path=/docs/hello.txt")).send().await.unwrap();
    assert!(resp.headers()["content-disposition"].to_str().unwrap().contains("hello.txt"));
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"hello over http");

    let (status, body) = get_json(&client, &format!("{base}/filemanager?mode=rename&old=/docs/hello.txt&new=hi.txt")).await;
    assert_eq!(status, 200);
    assert_eq!(body["new_path"], "/docs/hi.txt");

    handle.abort();
}

#[tokio::test]
async fn errors_are_structured() {
    let (handle, base) = start_ephemeral().await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, &format!("{base}/filemanager?mode=getinfo&path=/nope")).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["type"], "not_found");

    let (status, body) = get_json(&client, &format!("{base}/filemanager?mode=getuploadpath")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "unknown_operation");

    get_json(&client, &format!("{base}/filemanager?mode=addfolder&path=/&name=a")).await;
    get_json(&client, &format!("{base}/filemanager?mode=addfolder&path=/a&name=b")).await;
    let (status, body) = get_json(&client, &format!("{base}/filemanager?mode=delete&path=/a")).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["type"], "not_empty");

    let (status, body) = get_json(&client, &format!("{base}/filemanager?mode=addfolder&path=/&name=a")).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["type"], "already_exists");

    let resp = client.get(format!("{base}/files/a")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let (status, stats) = get_json(&client, &format!("{base}/stats")).await;
    assert_eq!(status, 200);
    assert_eq!(stats["rollback_failures"], 0);

    handle.abort();
}
