mod common;

use common::{MockAdapter, p1, p2, p3, records, setup, setup_with};
use datastore::{prelude::*, serde_json::{Value, json}};
use serde::{Deserialize, Serialize};

#[tokio::test]
async fn defines_resources_once() {
    let fx = setup().await;

    let err = fx.store.define_resource(ResourceDefinition::builder("post")).await.unwrap_err();
    assert!(matches!(err, DataStoreError::IllegalArgument(_)));

    let definition = fx.store.definition("post").await.unwrap();
    assert_eq!(definition.endpoint, "posts");
    assert_eq!(definition.base_url, "http://test.local");
    assert_eq!(definition.id_attribute, "id");
}

#[tokio::test]
async fn custom_id_attribute() {
    let fx = setup().await;
    fx.store
        .define_resource(ResourceDefinition::builder("user").id_attribute("_id"))
        .await
        .unwrap();

    fx.store.inject("user", json!({ "_id": "abc", "name": "John" })).await.unwrap();

    assert!(fx.store.get("user", "abc").await.unwrap().is_some());
    assert!(fx.store.inject("user", json!({ "id": 1 })).await.is_err());
}

#[tokio::test]
async fn find_returns_cached_records_without_the_adapter() {
    let fx = setup().await;
    fx.store.inject("post", p1()).await.unwrap();

    let found = fx.store.find("post", 5, FindOptions::new()).await.unwrap();

    assert_eq!(Value::Object(found), p1());
    assert_eq!(fx.adapter.find_calls(), 0);
}

#[tokio::test]
async fn find_coalesces_and_injects() {
    let fx = setup_with(MockAdapter::gated()).await;
    fx.adapter.respond_find(Ok(p2()));

    let (first, second, ()) = tokio::join!(
        fx.store.find("post", 6, FindOptions::new()),
        fx.store.find("post", 6, FindOptions::new()),
        async {
            tokio::task::yield_now().await;
            fx.adapter.release();
        },
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(fx.adapter.find_calls(), 1);
    assert!(fx.store.last_saved("post", Some(6.into())).await.unwrap().is_some());
    assert_eq!(fx.hooks.counts(), (1, 1, 0, 1));

    fx.store.find("post", 6, FindOptions::new().bypass_cache(true)).await.unwrap();
    assert_eq!(fx.adapter.find_calls(), 2);
}

#[tokio::test]
async fn find_without_caching_leaves_the_store_untouched() {
    let fx = setup().await;
    fx.adapter.respond_find(Ok(p3()));

    let found = fx.store.find("post", 7, FindOptions::new().cache_response(false)).await.unwrap();

    assert_eq!(Value::Object(found), p3());
    assert!(fx.store.get("post", 7).await.unwrap().is_none());
}

#[tokio::test]
async fn create_serializes_and_injects() {
    let fx = setup().await;

    let created = fx.store.create("post", p1(), SaveOptions::new()).await.unwrap();

    assert_eq!(Value::Object(created), p1());
    assert_eq!(fx.adapter.last_write(), Some(p1()));
    assert!(fx.store.get("post", 5).await.unwrap().is_some());
    assert!(fx.store.last_saved("post", Some(5.into())).await.unwrap().is_some());
    assert_eq!(fx.hooks.counts(), (1, 1, 1, 1));
}

#[tokio::test]
async fn create_rejects_non_objects() {
    let fx = setup().await;

    let err = fx.store.create("post", json!([p1()]), SaveOptions::new()).await.unwrap_err();

    assert_eq!(err, DataStoreError::IllegalArgument("attrs: Must be an object!".into()));
    assert_eq!(fx.adapter.write_calls(), 0);
}

#[tokio::test]
async fn update_merges_the_response() {
    let fx = setup().await;
    fx.store.inject("post", p1()).await.unwrap();

    let updated = fx.store.update("post", 5, json!({ "age": 31 }), SaveOptions::new()).await.unwrap();

    assert_eq!(Value::Object(updated), json!({ "author": "John", "age": 31, "id": 5 }));
    assert!(!fx.store.has_changes("post", 5).await.unwrap());
}

#[tokio::test]
async fn save_sends_only_changes_when_asked() {
    let fx = setup().await;
    fx.store.inject("post", p1()).await.unwrap();

    let unchanged = fx.store.save("post", 5, SaveOptions::new().changes_only(true)).await.unwrap();
    assert_eq!(Value::Object(unchanged), p1());
    assert_eq!(fx.adapter.write_calls(), 0);

    fx.store
        .modify("post", 5, |post| {
            post.insert("author".into(), json!("Johnny"));
        })
        .await
        .unwrap();
    assert!(fx.store.has_changes("post", 5).await.unwrap());

    fx.store.save("post", 5, SaveOptions::new().changes_only(true)).await.unwrap();

    assert_eq!(fx.adapter.last_write(), Some(json!({ "author": "Johnny" })));
    assert!(!fx.store.has_changes("post", 5).await.unwrap());

    fx.store.save("post", 5, SaveOptions::new()).await.unwrap();
    assert_eq!(fx.adapter.last_write(), Some(json!({ "author": "Johnny", "age": 30, "id": 5 })));
}

#[tokio::test]
async fn save_requires_a_cached_record() {
    let fx = setup().await;

    let err = fx.store.save("post", 99, SaveOptions::new()).await.unwrap_err();

    assert_eq!(err, DataStoreError::NotFound("post".into(), "99".into()));
}

#[tokio::test]
async fn destroy_ejects() {
    let fx = setup().await;
    fx.store.inject("post", p1()).await.unwrap();

    let id = fx.store.destroy("post", 5, SaveOptions::new()).await.unwrap();

    assert_eq!(id, RecordId::from(5));
    assert!(fx.store.get("post", 5).await.unwrap().is_none());
}

#[tokio::test]
async fn inject_stamps_modified_but_not_saved() {
    let fx = setup().await;

    let injected = fx.store.inject("post", json!([p1(), p2()])).await.unwrap();

    assert_eq!(injected, records(&[p1(), p2()]));
    assert!(fx.store.last_modified("post", Some(5.into())).await.unwrap().is_some());
    assert!(fx.store.last_saved("post", Some(5.into())).await.unwrap().is_none());
    assert!(fx.store.last_saved("post", None).await.unwrap().is_none());
    assert_eq!(fx.hooks.counts(), (2, 2, 0, 0));
}

#[tokio::test]
async fn timestamps_strictly_increase() {
    let fx = setup().await;
    fx.store.inject("post", json!([p1(), p2(), p3()])).await.unwrap();

    let mut stamps = Vec::new();
    for id in [5, 6, 7] {
        stamps.push(fx.store.last_modified("post", Some(id.into())).await.unwrap().unwrap());
    }

    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(fx.store.last_modified("post", None).await.unwrap(), stamps.last().copied());
}

#[tokio::test]
async fn get_all_keeps_requested_order() {
    let fx = setup().await;
    fx.store.inject("post", json!([p1(), p2(), p3()])).await.unwrap();

    let some = fx
        .store
        .get_all("post", Some(vec![7.into(), 99.into(), 5.into()]))
        .await
        .unwrap();
    let all = fx.store.get_all("post", None).await.unwrap();

    assert_eq!(some, records(&[p3(), p1()]));
    assert_eq!(all, records(&[p1(), p2(), p3()]));
}

#[tokio::test]
async fn eject_and_eject_all() {
    let fx = setup().await;
    fx.store.inject("post", json!([p1(), p2(), p3()])).await.unwrap();

    assert_eq!(fx.store.eject("post", 5).await.unwrap().map(Value::Object), Some(p1()));
    assert_eq!(fx.store.eject("post", 5).await.unwrap(), None);

    let ejected = fx.store.eject_all("post", json!({ "author": "Sally" })).await.unwrap();
    assert_eq!(ejected, records(&[p2()]));
    assert_eq!(fx.store.get_all("post", None).await.unwrap(), records(&[p3()]));
}

#[tokio::test]
async fn change_tracking() {
    let fx = setup().await;
    fx.store.inject("post", p1()).await.unwrap();

    assert!(!fx.store.has_changes("post", 5).await.unwrap());

    fx.store
        .modify("post", 5, |post| {
            post.insert("age".into(), json!(31));
            post.insert("tags".into(), json!(["new"]));
            post.remove("author");
            post.insert("id".into(), json!(1000));
        })
        .await
        .unwrap();

    let changes = fx.store.changes("post", 5).await.unwrap().unwrap();
    assert_eq!(Value::Object(changes.changed), json!({ "age": 31 }));
    assert_eq!(Value::Object(changes.added), json!({ "tags": ["new"] }));
    assert_eq!(Value::Object(changes.removed), json!({ "author": "John" }));
    assert_eq!(fx.store.previous("post", 5).await.unwrap().map(Value::Object), Some(p1()));

    let err = fx.store.modify("post", 99, |_| {}).await.unwrap_err();
    assert_eq!(err, DataStoreError::NotFound("post".into(), "99".into()));
}

#[tokio::test]
async fn filter_supports_sorting_and_paging() {
    let fx = setup().await;
    fx.store.inject("post", json!([p1(), p2(), p3()])).await.unwrap();

    let page = fx
        .store
        .filter("post", json!({ "orderBy": [["age", "DESC"]], "offset": 1, "limit": 1 }))
        .await
        .unwrap();

    assert_eq!(page, records(&[p2()]));
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Post {
    id: i64,
    author: String,
    age: i64,
}

impl Model for Post {
    fn resource_name() -> &'static str {
        "post"
    }
}

#[tokio::test]
async fn typed_resource_round_trips_models() {
    let fx = setup().await;
    fx.adapter.respond_find_all(Ok(json!([p1(), p2()])));
    let posts = fx.store.typed::<Post>();

    let fetched = posts.find_all(json!({}), FindAllOptions::new()).await.unwrap();
    assert_eq!(fetched[0], Post { id: 5, author: "John".into(), age: 30 });

    let injected = posts
        .inject(&Post { id: 10, author: "Adam".into(), age: 40 })
        .await
        .unwrap();
    assert_eq!(injected.id, 10);

    let olds = posts.filter(json!({ "where": { "age": { ">=": 31 } } })).await.unwrap();
    assert_eq!(olds.iter().map(|post| post.id).collect::<Vec<_>>(), vec![6, 10]);
    assert_eq!(posts.get(6).await.unwrap().map(|post| post.author), Some("Sally".into()));
    assert_eq!(posts.name(), "post");
}
