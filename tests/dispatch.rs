use std::fmt;
use std::sync::{Arc, Mutex};

use baton::middleware::{from_fn, BoxedMiddleware};
use baton::{
    request_bag, BoxError, Method, Request, Response, ResponseWriter, Router, RouterBuilder,
    StatusCode, Value,
};
use bytes::Bytes;

// ── Helpers ───────────────────────────────────────────────────────────────────

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A middleware that records `label` and continues.
fn record(log: &Log, label: &'static str) -> BoxedMiddleware {
    let log = Arc::clone(log);
    from_fn(move |_w: ResponseWriter, _req: Request| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(label.to_owned());
            Ok(None)
        }
    })
}

/// Terminal step: records "T" and writes `200 OK`.
fn terminal(log: &Log) -> BoxedMiddleware {
    let log = Arc::clone(log);
    from_fn(move |w: ResponseWriter, _req: Request| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push("T".to_owned());
            w.write(Response::text("ok"));
            Ok(None)
        }
    })
}

#[derive(Debug)]
struct NotAuthorized;

impl fmt::Display for NotAuthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not authorized")
    }
}

impl std::error::Error for NotAuthorized {}

/// Error handler that records each call and answers 401 for `NotAuthorized`.
fn builder_with(errors: &Log) -> RouterBuilder {
    let errors = Arc::clone(errors);
    Router::builder().error_handler(move |w: ResponseWriter, _req: Request, err: BoxError| {
        let errors = Arc::clone(&errors);
        async move {
            let status = if err.downcast_ref::<NotAuthorized>().is_some() {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            errors.lock().unwrap().push(err.to_string());
            w.write(Response::status(status));
        }
    })
}

fn request(method: http::Method, uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

fn get(uri: &str) -> http::Request<Bytes> {
    request(http::Method::GET, uri)
}

fn none() -> Vec<BoxedMiddleware> {
    Vec::new()
}

// ── Chain order ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn chain_runs_before_route_after_then_terminal() {
    let (calls, errors) = (log(), log());
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .before_dispatch([record(&calls, "b1"), record(&calls, "b2")])
        .before_dispatch([record(&calls, "b3")])
        .after_dispatch([record(&calls, "a1")])
        .after_dispatch([record(&calls, "a2")])
        .get("/x", [record(&calls, "r1"), record(&calls, "r2")])
        .build();

    let res = router.dispatch(get("/x")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(entries(&calls), ["b1", "b2", "b3", "r1", "r2", "a1", "a2", "T"]);
    assert!(entries(&errors).is_empty());
}

#[tokio::test]
async fn globals_added_after_registration_do_not_apply() {
    let (calls, errors) = (log(), log());
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .before_dispatch([record(&calls, "early")])
        .get("/old", [record(&calls, "old")])
        .before_dispatch([record(&calls, "late")])
        .after_dispatch([record(&calls, "after")])
        .get("/new", [record(&calls, "new")])
        .build();

    router.dispatch(get("/old")).await;
    assert_eq!(entries(&calls), ["early", "old", "T"]);

    calls.lock().unwrap().clear();
    router.dispatch(get("/new")).await;
    assert_eq!(entries(&calls), ["early", "late", "new", "after", "T"]);
}

#[tokio::test]
async fn none_entries_are_skipped_everywhere() {
    let (calls, errors) = (log(), log());
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .before_dispatch([None, Some(record(&calls, "b")), None])
        .after_dispatch([None::<BoxedMiddleware>])
        .get("/x", [None, Some(record(&calls, "r"))])
        .build();

    let res = router.dispatch(get("/x")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(entries(&calls), ["b", "r", "T"]);
}

#[tokio::test]
async fn empty_route_list_still_runs_globals_and_terminal() {
    let (calls, errors) = (log(), log());
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .before_dispatch([record(&calls, "b")])
        .after_dispatch([record(&calls, "a")])
        .get("/x", none())
        .build();

    router.dispatch(get("/x")).await;
    assert_eq!(entries(&calls), ["b", "a", "T"]);
}

#[tokio::test]
async fn response_handler_set_last_is_still_terminal() {
    let (calls, errors) = (log(), log());
    let router = builder_with(&errors)
        .get("/x", [record(&calls, "r")])
        .response_handler(terminal(&calls))
        .build();

    router.dispatch(get("/x")).await;
    assert_eq!(entries(&calls), ["r", "T"]);
}

// ── Short-circuit on error ────────────────────────────────────────────────────

#[tokio::test]
async fn error_stops_chain_and_calls_error_handler_once() {
    let (calls, errors) = (log(), log());
    let failing = {
        let calls = Arc::clone(&calls);
        from_fn(move |_w: ResponseWriter, _req: Request| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().unwrap().push("fail".to_owned());
                Err(NotAuthorized.into())
            }
        })
    };
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .before_dispatch([record(&calls, "b")])
        .after_dispatch([record(&calls, "a")])
        .get("/x", [record(&calls, "r1"), failing, record(&calls, "r3")])
        .build();

    let res = router.dispatch(get("/x")).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(entries(&calls), ["b", "r1", "fail"]);
    assert_eq!(entries(&errors), ["not authorized"]);
}

#[tokio::test]
async fn error_handler_sees_context_derived_before_failure() {
    #[derive(Clone)]
    struct Tenant(&'static str);

    let seen = log();
    let seen_in_handler = Arc::clone(&seen);
    let router = Router::builder()
        .error_handler(move |w: ResponseWriter, req: Request, _err: BoxError| {
            let seen = Arc::clone(&seen_in_handler);
            async move {
                if let Some(t) = req.context().get::<Tenant>() {
                    seen.lock().unwrap().push(t.0.to_owned());
                }
                w.write(StatusCode::FORBIDDEN);
            }
        })
        .get(
            "/x",
            [
                from_fn(|_w: ResponseWriter, req: Request| async move {
                    Ok(Some(req.context().with(Tenant("acme"))))
                }),
                from_fn(|_w: ResponseWriter, _req: Request| async move {
                    Err("denied".into())
                }),
            ],
        )
        .build();

    let res = router.dispatch(get("/x")).await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(entries(&seen), ["acme"]);
}

#[tokio::test]
async fn error_handler_writing_nothing_yields_500() {
    let router = Router::builder()
        .error_handler(|_w: ResponseWriter, _req: Request, _err: BoxError| async {})
        .get("/x", [from_fn(|_w: ResponseWriter, _req: Request| async move {
            Err("boom".into())
        })])
        .build();

    let res = router.dispatch(get("/x")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn error_response_replaces_earlier_writes() {
    let router = Router::builder()
        .error_handler(|_w: ResponseWriter, _req: Request, _err: BoxError| async {})
        .get(
            "/x",
            [
                from_fn(|w: ResponseWriter, _req: Request| async move {
                    w.write(Response::text("partial"));
                    Ok(None)
                }),
                from_fn(|_w: ResponseWriter, _req: Request| async move { Err("boom".into()) }),
            ],
        )
        .build();

    let res = router.dispatch(get("/x")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn error_handler_write_wins_over_earlier_write() {
    let errors = log();
    let router = builder_with(&errors)
        .get(
            "/x",
            [
                from_fn(|w: ResponseWriter, _req: Request| async move {
                    w.write(Response::text("partial"));
                    Ok(None)
                }),
                from_fn(|_w: ResponseWriter, _req: Request| async move {
                    Err(NotAuthorized.into())
                }),
            ],
        )
        .build();

    let res = router.dispatch(get("/x")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert!(res.body().is_empty());
}

// ── Derived context ───────────────────────────────────────────────────────────

#[tokio::test]
async fn derived_context_is_visible_to_every_later_step() {
    #[derive(Clone)]
    struct UserId(u64);

    let (seen, errors) = (log(), log());
    let observe = |label: &'static str| {
        let seen = Arc::clone(&seen);
        from_fn(move |_w: ResponseWriter, req: Request| {
            let seen = Arc::clone(&seen);
            async move {
                let user = req.context().get::<UserId>().map(|u| u.0);
                seen.lock().unwrap().push(format!("{label}:{user:?}"));
                Ok(None)
            }
        })
    };

    let router = builder_with(&errors)
        .before_dispatch([observe("before")])
        .after_dispatch([observe("after")])
        .get(
            "/me",
            [
                from_fn(|_w: ResponseWriter, req: Request| async move {
                    Ok(Some(req.context().with(UserId(7))))
                }),
                observe("route"),
            ],
        )
        .build();

    router.dispatch(get("/me")).await;
    assert_eq!(entries(&seen), ["before:None", "route:Some(7)", "after:Some(7)"]);
}

// ── Bag ───────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn path_params_are_in_the_bag() {
    let (seen, errors) = (log(), log());
    let capture = {
        let seen = Arc::clone(&seen);
        from_fn(move |_w: ResponseWriter, req: Request| {
            let seen = Arc::clone(&seen);
            async move {
                let bag = req.bag();
                let id = bag.get("id").and_then(|v| v.as_str().map(str::to_owned));
                let post = bag.get("post").and_then(|v| v.as_str().map(str::to_owned));
                seen.lock().unwrap().push(format!("{id:?} {post:?} {:?}", req.param("id")));
                Ok(None)
            }
        })
    };

    let router = builder_with(&errors)
        .get("/users/:id/posts/{post}", [capture])
        .build();

    router.dispatch(get("/users/42/posts/7")).await;
    assert_eq!(entries(&seen), [r#"Some("42") Some("7") Some("42")"#]);
}

#[tokio::test]
async fn encoded_params_are_decoded() {
    let (seen, errors) = (log(), log());
    let capture = {
        let seen = Arc::clone(&seen);
        from_fn(move |_w: ResponseWriter, req: Request| {
            let seen = Arc::clone(&seen);
            async move {
                let name = req.bag().get("name").and_then(|v| v.as_str().map(str::to_owned));
                seen.lock().unwrap().push(format!("{name:?} {:?}", req.param("name")));
                Ok(None)
            }
        })
    };
    let router = builder_with(&errors).get("/items/:name", [capture]).build();

    router.dispatch(get("/items/a%20b%2Fc")).await;
    assert_eq!(entries(&seen), [r#"Some("a b/c") Some("a b/c")"#]);
}

#[tokio::test]
async fn bag_writes_flow_to_later_steps() {
    let (seen, errors) = (log(), log());
    let router = builder_with(&errors)
        .before_dispatch([from_fn(|_w: ResponseWriter, req: Request| async move {
            req.bag().set("role", "admin");
            Ok(None)
        })])
        .get("/x", [{
            let seen = Arc::clone(&seen);
            from_fn(move |_w: ResponseWriter, req: Request| {
                let seen = Arc::clone(&seen);
                async move {
                    let role = req.bag().get("role");
                    seen.lock().unwrap().push(format!("{role:?}"));
                    Ok(None)
                }
            })
        }])
        .build();

    router.dispatch(get("/x")).await;
    assert_eq!(entries(&seen), [format!("{:?}", Some(Value::from("admin")))]);
}

#[tokio::test]
async fn each_request_gets_a_fresh_bag() {
    let (seen, errors) = (log(), log());
    let router = builder_with(&errors)
        .get("/items/:id", [{
            let seen = Arc::clone(&seen);
            from_fn(move |_w: ResponseWriter, req: Request| {
                let seen = Arc::clone(&seen);
                async move {
                    let bag = req.bag();
                    seen.lock().unwrap().push(format!("{}", bag.contains("visited")));
                    bag.set("visited", true);
                    Ok(None)
                }
            })
        }])
        .build();

    router.dispatch(get("/items/1")).await;
    router.dispatch(get("/items/1")).await;
    assert_eq!(entries(&seen), ["false", "false"]);
}

#[test]
fn request_bag_outside_dispatch_is_empty() {
    let req = Request::from_http(get("/items/42"));
    let bag = request_bag(&req);
    assert!(bag.is_empty());
    assert_eq!(bag.get("id"), None);
}

// ── Not found / method not allowed ────────────────────────────────────────────

#[tokio::test]
async fn unmatched_path_uses_default_404() {
    let errors = log();
    let router = builder_with(&errors).get("/x", none()).build();

    let res = router.dispatch(get("/nope")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert!(entries(&errors).is_empty());
}

#[tokio::test]
async fn custom_not_found_handler() {
    let errors = log();
    let router = builder_with(&errors)
        .not_found(|req: Request| async move { format!("nothing at {}", req.path()) })
        .build();

    let res = router.dispatch(get("/missing")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body().as_ref(), b"nothing at /missing");
}

#[tokio::test]
async fn wrong_method_gets_405_with_allow() {
    let errors = log();
    let router = builder_with(&errors)
        .post("/items", none())
        .put("/items", none())
        .get("/other", none())
        .build();

    let res = router.dispatch(request(http::Method::DELETE, "/items")).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("OPTIONS, POST, PUT"));
}

#[tokio::test]
async fn options_without_a_route_lists_allowed_methods() {
    let (calls, errors) = (log(), log());
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .get("/items/:id", none())
        .delete("/items/:id", none())
        .build();

    let res = router.dispatch(request(http::Method::OPTIONS, "/items/3")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.header("allow"), Some("DELETE, GET, OPTIONS"));
    assert!(res.body().is_empty());
    assert!(entries(&calls).is_empty());

    let res = router.dispatch(request(http::Method::OPTIONS, "/elsewhere")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trailing_slash_mismatch_redirects() {
    let errors = log();
    let router = builder_with(&errors)
        .get("/items", none())
        .post("/items", none())
        .get("/users/:id/", none())
        .build();

    let res = router.dispatch(get("/items/?page=2")).await;
    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("location"), Some("/items?page=2"));

    let res = router.dispatch(request(http::Method::POST, "/items/")).await;
    assert_eq!(res.status_code(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.header("location"), Some("/items"));

    let res = router.dispatch(get("/users/5")).await;
    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("location"), Some("/users/5/"));

    // Only the request method's own routes are considered.
    let res = router.dispatch(request(http::Method::PUT, "/items/")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn extension_methods_are_routable() {
    let (calls, errors) = (log(), log());
    let purge = http::Method::from_bytes(b"PURGE").unwrap();
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .route(purge.clone(), "/cache/:key", [record(&calls, "purge")])
        .get("/cache/:key", none())
        .build();

    let res = router.dispatch(request(purge, "/cache/home")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(entries(&calls), ["purge", "T"]);

    let res = router.dispatch(request(http::Method::DELETE, "/cache/home")).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("GET, OPTIONS, PURGE"));
}

#[tokio::test]
async fn every_verb_helper_registers_its_method() {
    let errors = log();
    let ok = || from_fn(|w: ResponseWriter, _req: Request| async move {
        w.write(StatusCode::NO_CONTENT);
        Ok(None)
    });
    let router = builder_with(&errors)
        .get("/v", [ok()])
        .post("/v", [ok()])
        .put("/v", [ok()])
        .patch("/v", [ok()])
        .delete("/v", [ok()])
        .options("/v", [ok()])
        .head("/v", [ok()])
        .route(Method::Trace, "/v", [ok()])
        .build();

    for m in ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "HEAD", "TRACE"] {
        let method = http::Method::from_bytes(m.as_bytes()).unwrap();
        let res = router.dispatch(request(method, "/v")).await;
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT, "{m}");
    }
}

#[tokio::test]
async fn chain_without_write_answers_200() {
    let errors = log();
    let router = builder_with(&errors).get("/quiet", none()).build();

    let res = router.dispatch(get("/quiet")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert!(res.body().is_empty());
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_item_lookup_succeeds() {
    let (calls, errors, params) = (log(), log(), log());
    let m = {
        let calls = Arc::clone(&calls);
        let params = Arc::clone(&params);
        from_fn(move |_w: ResponseWriter, req: Request| {
            let calls = Arc::clone(&calls);
            let params = Arc::clone(&params);
            async move {
                calls.lock().unwrap().push("M".to_owned());
                if let Some(Value::Text(id)) = request_bag(&req).get("id") {
                    params.lock().unwrap().push(id);
                }
                Ok(None)
            }
        })
    };
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .get("/items/:id", [m])
        .build();

    let res = router.dispatch(get("/items/42")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(entries(&calls), ["M", "T"]);
    assert_eq!(entries(&params), ["42"]);
    assert!(entries(&errors).is_empty());
}

#[tokio::test]
async fn scenario_item_lookup_not_authorized() {
    let (calls, errors) = (log(), log());
    let m = {
        let calls = Arc::clone(&calls);
        from_fn(move |_w: ResponseWriter, _req: Request| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().unwrap().push("M".to_owned());
                Err(NotAuthorized.into())
            }
        })
    };
    let router = builder_with(&errors)
        .response_handler(terminal(&calls))
        .get("/items/:id", [m])
        .build();

    let res = router.dispatch(get("/items/42")).await;

    assert_eq!(entries(&calls), ["M"]);
    assert_eq!(entries(&errors), ["not authorized"]);
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert!(res.body().is_empty());
}
