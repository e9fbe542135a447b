//! Demo route chain served by the binary.
//!
//! | Route                 | Behaviour                                         |
//! |-----------------------|---------------------------------------------------|
//! | `GET /health`         | `ok`                                              |
//! | `POST /echo`          | streams the request body back                     |
//! | `POST /json`          | parses the body as JSON and wraps it              |
//! | `GET /query`          | decoded query parameters as JSON                  |
//! | `POST /upload`        | counts body bytes, reports the `checksum` trailer |
//! | `GET /bytes/{n}`      | streams `n` generated bytes from a reader         |
//! | `/users`, `/users/{id}` | `users` bean (list, get, create, delete)        |
//!
//! Anything else is left unmatched (404 at the transport).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use crate::config::HttpConfig;
use crate::entity::Entity;
use crate::http::{HttpResult, Method, Response, ServerRequest};
use crate::routing::{Bean, RouteBuilder, RouteResult, Router};

const MAX_GENERATED_BYTES: u64 = 64 * 1024 * 1024;

/// Build the demo chain with default message settings.
pub fn router() -> RouteResult<Router> {
    router_with(&HttpConfig::default())
}

/// Build the demo chain; reader-backed bodies use `http.read_chunk_size`.
pub fn router_with(http: &HttpConfig) -> RouteResult<Router> {
    let chunk_size = http.read_chunk_size;
    RouteBuilder::new()
        .if_method_and_uri_match(Method::Get, "/health", health)
        .else_if_method_and_uri_match(Method::Post, "/echo", echo)
        .else_if_method_and_uri_match(Method::Post, "/json", json_echo)
        .else_if_method_and_uri_match(Method::Get, "/query", query_echo)
        .else_if_method_and_uri_match(Method::Post, "/upload", upload)
        .else_if_method_and_uri_match(Method::Get, "/bytes/{n}", move |req: ServerRequest| {
            generated_bytes(req, chunk_size)
        })
        .else_if_matches_bean_method_then(users_bean(UserStore::default()), |resp: Response| {
            resp.with_header("Cache-Control", "no-store")
        })
        .build()
}

async fn health(req: ServerRequest) -> HttpResult<Response> {
    Ok(req.respond().text("ok").ok())
}

async fn echo(req: ServerRequest) -> HttpResult<Response> {
    let mut builder = req.respond();
    if let Some(content_type) = req.first_header("content-type") {
        builder = builder.header("Content-Type", content_type);
    }
    Ok(builder.entity(req.into_request().into_entity()).ok())
}

async fn json_echo(req: ServerRequest) -> HttpResult<Response> {
    let value: Value = req.entity().as_json().await?;
    Ok(req.respond().json(&json!({ "received": value }))?.ok())
}

async fn query_echo(req: ServerRequest) -> HttpResult<Response> {
    let params = req.query_parameters();
    let body: BTreeMap<&str, &[String]> = params.keys().map(|k| (k, params.get_all(k))).collect();
    Ok(req.respond().json(&body)?.ok())
}

async fn upload(req: ServerRequest) -> HttpResult<Response> {
    let mut chunks = req.entity().as_chunks();
    let mut received = 0usize;
    let mut count = 0usize;
    while let Some(chunk) = chunks.try_next().await? {
        received += chunk.len();
        count += 1;
    }
    let body = json!({
        "bytes": received,
        "chunks": count,
        "checksum": req.first_trailing_header("checksum"),
    });
    Ok(req.respond().json(&body)?.ok())
}

async fn generated_bytes(req: ServerRequest, chunk_size: usize) -> HttpResult<Response> {
    let n = match req.uri_parameter("n").map(str::parse::<u64>) {
        Some(Ok(n)) if n <= MAX_GENERATED_BYTES => n,
        _ => return Ok(req.respond().text("invalid byte count").bad_request()),
    };
    let reader = tokio::io::repeat(b'x').take(n);
    Ok(req
        .respond()
        .header("Content-Type", "application/octet-stream")
        .entity(Entity::from_reader(reader, chunk_size))
        .ok())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

/// In-memory user store behind the `users` bean.
#[derive(Debug, Default)]
pub struct UserStore {
    next_id: AtomicU64,
    users: Mutex<BTreeMap<u64, User>>,
}

impl UserStore {
    fn users(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn get_users(self: Arc<Self>, req: ServerRequest) -> HttpResult<Response> {
        let users: Vec<User> = self.users().values().cloned().collect();
        Ok(req.respond().json(&users)?.ok())
    }

    async fn get_user(self: Arc<Self>, req: ServerRequest) -> HttpResult<Response> {
        let Some(id) = parse_id(&req) else {
            return Ok(req.respond().text("invalid user id").bad_request());
        };
        let user = self.users().get(&id).cloned();
        match user {
            Some(user) => Ok(req.respond().json(&user)?.ok()),
            None => Ok(req.respond().not_found()),
        }
    }

    async fn post_user(self: Arc<Self>, req: ServerRequest) -> HttpResult<Response> {
        let new_user: NewUser = req.entity().as_json().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User {
            id,
            name: new_user.name,
        };
        self.users().insert(id, user.clone());
        tracing::info!(user_id = id, "User created");
        Ok(req
            .respond()
            .header("Location", format!("/users/{id}"))
            .json(&user)?
            .created())
    }

    async fn delete_user(self: Arc<Self>, req: ServerRequest) -> HttpResult<Response> {
        let Some(id) = parse_id(&req) else {
            return Ok(req.respond().text("invalid user id").bad_request());
        };
        let removed = self.users().remove(&id);
        match removed {
            Some(_) => Ok(req.respond().no_content()),
            None => Ok(req.respond().not_found()),
        }
    }
}

fn parse_id(req: &ServerRequest) -> Option<u64> {
    req.uri_parameter("id")?.parse().ok()
}

/// The `users` bean: verbs come from the handler names.
pub fn users_bean(store: UserStore) -> Bean<UserStore> {
    Bean::new("users", store)
        .handler("get_users", "/users", UserStore::get_users)
        .handler("post_user", "/users", UserStore::post_user)
        .handler("get_user", "/users/{id}", UserStore::get_user)
        .handler("delete_user", "/users/{id}", UserStore::delete_user)
}
