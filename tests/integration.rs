//! Integration tests for scope-sync.
//!
//! These tests exercise the public API from outside the crate: accessors,
//! commits, variables and scope lifecycles working together.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;

use scope_sync::commit::StateStore;
use scope_sync::event::{CONTENT_READY_EVENT, SERVICE_ERROR_EVENT};
use scope_sync::lifecycle::{
    AppScope, InitOutcome, LifecycleEvent, PageScope, Runtime, ScopeConfig, ScopeDefinition,
    ScopeStatus,
};
use scope_sync::proxy::{Gettable, Read, Scope, Settable, REGISTRY_FIELD, SET_PROPERTY};
use scope_sync::testing::{Harness, MockSource};
use scope_sync::value::{ObjectRef, Value};
use scope_sync::variable::{FnSource, Variable, VariableError};

fn scope_over(state: serde_json::Value) -> (Scope, Rc<StateStore>) {
    let root = Value::from(state).as_object().cloned().unwrap_or_default();
    let store = Rc::new(StateStore::new(root.clone()));
    (Scope::new("page", root, store.clone()), store)
}

fn object_at(root: &ObjectRef, field: &str) -> ObjectRef {
    root.get(field).and_then(|v| v.as_object().cloned()).unwrap()
}

fn no_settle() -> ScopeConfig {
    ScopeConfig::new().with_settle_frames(0)
}

// ---------------------------------------------------------------------------
// Accessor properties
// ---------------------------------------------------------------------------

#[test]
fn test_last_write_is_visible() {
    let (scope, _) = scope_over(json!({"name": "a"}));
    let proxy = scope.proxy();
    proxy.set("name", "b");
    proxy.set("name", "c");
    assert_eq!(proxy.value("name").as_str(), Some("c"));
}

#[test]
fn test_equal_write_does_not_commit() {
    let (scope, store) = scope_over(json!({"count": 3}));
    assert!(!scope.proxy().set("count", 3));
    assert_eq!(store.scheduled_count(), 0);
}

#[test]
fn test_commit_copies_only_the_written_path() {
    let (scope, store) = scope_over(json!({"a": {"b": {"c": 1}}, "side": {"x": 1}}));
    let before = store.snapshot();
    let before_a = object_at(&before, "a");
    let before_b = object_at(&before_a, "b");
    let before_side = object_at(&before, "side");

    let b = scope
        .proxy()
        .get("a")
        .into_scope()
        .and_then(|a| a.get("b").into_scope())
        .unwrap();
    b.set("c", 2);
    store.flush();

    let after = store.snapshot();
    let after_a = object_at(&after, "a");
    let after_b = object_at(&after_a, "b");
    assert!(!after.ptr_eq(&before));
    assert!(!after_a.ptr_eq(&before_a));
    assert!(!after_b.ptr_eq(&before_b));
    assert!(object_at(&after, "side").ptr_eq(&before_side));
    assert_eq!(after_b.get("c").unwrap().as_i64(), Some(2));
}

#[test]
fn test_array_push_recommits_new_reference() {
    let (scope, store) = scope_over(json!({"items": [1, 2, 3]}));
    let proxy = scope.proxy();
    let items = proxy.get("items").into_array().unwrap();
    let original = items.backing();

    assert_eq!(items.push(4), 4);
    assert_eq!(original.len(), 4);

    let Read::Array(current) = proxy.get("items") else {
        panic!("items should stay an array");
    };
    assert!(!current.backing().ptr_eq(&original));
    assert_eq!(current.to_vec().len(), 4);
    assert!(current.backing().get(3).unwrap().deep_eq(&Value::from(4)));

    store.flush();
    let committed = store.lookup(&["items"]).unwrap();
    assert!(!committed.as_array().unwrap().ptr_eq(&original));
    assert_eq!(committed.to_json(), json!([1, 2, 3, 4]));
}

#[test]
fn test_override_shadows_until_scope_clear() {
    let (scope, _) = scope_over(json!({"Widgets": {"label1": {"caption": "stored"}}}));
    let label = scope.registry().entity("label1");
    scope
        .overrides()
        .set("label1", label.instance(), "caption", Value::from("forced"));

    assert_eq!(label.value("caption").as_str(), Some("forced"));
    assert_eq!(
        label.backing().get("caption").unwrap().as_str(),
        Some("stored")
    );

    scope.clear();
    assert!(scope.overrides().is_empty());
    assert_eq!(label.value("caption").as_str(), Some("stored"));
}

#[test]
fn test_stale_instance_write_is_dropped() {
    let (scope, store) = scope_over(json!({"Widgets": {"w": {"value": 1}}}));
    let registry = scope.registry();
    let old = registry.entity("w");

    // remount under the same name
    registry.unmount("w");
    registry.set("w", Value::from(json!({"value": 1})));
    store.flush();

    old.set("value", 99);
    store.flush();

    assert_eq!(store.lookup(&["Widgets", "w", "value"]).unwrap().as_i64(), Some(1));
    assert_eq!(store.dropped_count(), 1);
    assert_eq!(registry.entity("w").value("value").as_i64(), Some(1));
}

#[test]
fn test_unmounted_entity_is_auto_vivified_on_read() {
    let (scope, store) = scope_over(json!({}));
    let ghost = scope.registry().entity("notYetMounted");
    assert_eq!(ghost.value("name").as_str(), Some("notYetMounted"));
    assert!(ghost.get("caption").is_undefined());
    assert_eq!(store.scheduled_count(), 0);
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_param_change_invokes_once() {
    let source = MockSource::ok(json!([]));
    let var = Variable::builder("Users", source.clone()).build();
    var.bind_params(|| Value::from(json!({"page": 1})));

    assert!(var.invoke_on_param_change().await.is_some());
    assert!(var.invoke_on_param_change().await.is_none());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_unauthorized_reaches_page_bus() {
    let runtime = Runtime::new();
    let source = MockSource::failing(VariableError::Service {
        status: 401,
        message: "session expired".into(),
    });
    let orders = Variable::builder("Orders", source).build();
    let page = PageScope::page(
        ScopeDefinition::new("Main")
            .with_variable(orders.clone())
            .with_config(no_settle()),
        &runtime,
        None,
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    page.scope().subscribe(SERVICE_ERROR_EVENT, move |payload| {
        sink.borrow_mut().push(payload.to_json());
    });

    page.init().await.unwrap();
    let result = orders.invoke(None).await;

    assert!(matches!(result, Err(VariableError::Service { status: 401, .. })));
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0]["variable"], json!("Orders"));
    assert_eq!(seen.borrow()[0]["status"], json!(401));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_startup_settles_all_and_fires_content_ready_once() {
    let runtime = Runtime::new();
    let first = Variable::builder("First", MockSource::ok(json!(1))).build();
    let second = Variable::builder(
        "Second",
        MockSource::failing(VariableError::Failed("unreachable".into())),
    )
    .build();
    let third = Variable::builder("Third", MockSource::ok(json!(3))).build();

    let page = PageScope::page(
        ScopeDefinition::new("Main")
            .with_variable(first.clone())
            .with_variable(second)
            .with_variable(third.clone())
            .with_config(
                ScopeConfig::new()
                    .with_startup_variable("First")
                    .with_startup_variable("Second")
                    .with_startup_variable("Third"),
            ),
        &runtime,
        None,
    );
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    page.scope()
        .subscribe(CONTENT_READY_EVENT, move |_| counter.set(counter.get() + 1));

    assert_eq!(page.init().await, Ok(InitOutcome::Ready));
    page.render();
    page.render();

    assert_eq!(page.status(), ScopeStatus::Ready);
    assert_eq!(fired.get(), 1);
    assert_eq!(first.dataset().as_i64(), Some(1));
    assert_eq!(third.dataset().as_i64(), Some(3));
    assert_eq!(page.proxy().value("loading").as_bool(), Some(false));
    let content_ready = page
        .tracker()
        .pending_events()
        .into_iter()
        .filter(|e| *e == LifecycleEvent::ContentReady)
        .count();
    assert_eq!(content_ready, 1);
}

#[tokio::test]
async fn test_startup_actions_run_in_order() {
    let runtime = Runtime::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut def = ScopeDefinition::new("Main").with_config(
        no_settle()
            .with_startup_action("LoadConfig")
            .with_startup_action("Track"),
    );
    for name in ["LoadConfig", "Track"] {
        let log = order.clone();
        let source = Rc::new(FnSource::new(move |_: &Value| {
            log.borrow_mut().push(name);
            Ok(Value::Null)
        }));
        def = def.with_variable(Variable::builder(name, source).action().build());
    }
    let page = PageScope::page(def, &runtime, None);
    page.init().await.unwrap();
    assert_eq!(*order.borrow(), vec!["LoadConfig", "Track"]);
}

#[tokio::test]
async fn test_teardown_mid_startup_discards_results() {
    let runtime = Runtime::new();
    let source = MockSource::ok(json!(["late"]));
    let gate = source.gate();
    let users = Variable::builder("Users", source.clone()).build();
    let page = PageScope::page(
        ScopeDefinition::new("Main")
            .with_variable(users.clone())
            .with_config(no_settle().with_startup_variable("Users")),
        &runtime,
        None,
    );

    let (outcome, ()) = tokio::join!(page.init(), async {
        tokio::task::yield_now().await;
        page.teardown();
        page.teardown();
        gate.open();
    });

    assert_eq!(outcome, Ok(InitOutcome::Aborted));
    assert!(users.dataset().is_null());
    assert!(!users.is_alive());
    assert_eq!(source.cancel_calls(), 1);
    assert!(runtime.root.current().is_none());
    assert!(!page.content_ready_fired());
}

#[tokio::test]
async fn test_app_teardown_keeps_pages_independent() {
    let runtime = Runtime::new();
    let session = Variable::builder("Session", MockSource::ok(json!({"user": "ada"}))).build();
    let app = AppScope::new(
        ScopeDefinition::new("App")
            .with_variable(session.clone())
            .with_config(no_settle().with_startup_variable("Session")),
        &runtime,
    );
    app.init().await.unwrap();

    let page = PageScope::page(
        ScopeDefinition::new("Main").with_config(no_settle()),
        &runtime,
        Some(&app),
    );
    page.init().await.unwrap();
    assert!(Rc::ptr_eq(&page.variable("Session").unwrap(), &session));

    page.teardown();
    assert!(session.is_alive());
    assert_eq!(session.listener_count(), 1);

    app.teardown();
    assert!(!session.is_alive());
    assert!(runtime.catalog.is_empty());
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_set_property_end_to_end() {
    let runtime = Runtime::new();
    let users = Variable::builder("Users", MockSource::ok(json!([])))
        .dataset(Value::from(json!([])))
        .build();
    let page = PageScope::page(
        ScopeDefinition::new("Main")
            .with_state(json!({"Widgets": {"userList": {}}}))
            .with_variable(users)
            .with_config(no_settle()),
        &runtime,
        None,
    );
    page.init().await.unwrap();
    page.render();

    let root = runtime.root.current().unwrap();
    let user_list = root
        .get(REGISTRY_FIELD)
        .into_registry()
        .unwrap()
        .get("userList");
    let before = page.store().scheduled_count();

    let set_property = user_list.get(SET_PROPERTY).into_setter().unwrap();
    set_property.call("selectedId", 5);
    assert_eq!(user_list.value("selectedId").as_i64(), Some(5));
    assert_eq!(page.store().scheduled_count(), before + 1);

    set_property.call("selectedId", 5);
    assert_eq!(page.store().scheduled_count(), before + 1);

    page.render();
    assert_eq!(
        page.store()
            .lookup(&["Widgets", "userList", "selectedId"])
            .unwrap()
            .as_i64(),
        Some(5)
    );
}

#[tokio::test]
async fn test_harness_drives_a_page() {
    let mut harness =
        Harness::new().with_app(ScopeDefinition::new("App").with_config(no_settle()));
    harness.start_app().await.unwrap();
    harness
        .open_page(ScopeDefinition::new("Main").with_config(no_settle()))
        .await
        .unwrap();

    harness.mount("grid1", json!({"rows": []}));
    let before = harness.commits();
    assert!(harness.set_property("grid1", "selected", 2));
    assert!(!harness.set_property("grid1", "selected", 2));
    assert_eq!(harness.commits(), before + 1);

    harness.tick().await;
    let snapshot = harness.snapshot().unwrap();
    let grid = object_at(&object_at(&snapshot, "Widgets"), "grid1");
    assert_eq!(grid.get("selected").unwrap().as_i64(), Some(2));

    assert!(harness.unmount("grid1"));
    harness.tick().await;
    assert!(!object_at(&harness.snapshot().unwrap(), "Widgets").contains_key("grid1"));
}
