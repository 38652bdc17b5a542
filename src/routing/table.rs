//! Route table.
//!
//! # Responsibilities
//! - Hold every registered path pattern with its method rule, arity and handler kind
//! - Resolve a request path to a route (exact patterns, then subtree patterns)
//! - Resolve an operation name to its route for the compat path
//!
//! # Design Decisions
//! - Patterns ending in `/` match the whole subtree below them
//! - Longest matching pattern wins; `/` matches everything else
//! - Built once from config and shared read-only

use std::collections::HashMap;
use std::fmt;

use axum::http::Method;

use crate::config::RoutesConfig;
use crate::translate::{Codec, Operation};

pub const STATUS_PATH: &str = "/Status";
pub const STATUS_TABLE_PATH: &str = "/StatusTable/";
pub const RAW_POST_PATH: &str = "/RawPost/";
pub const COMPAT_PATH: &str = "/";

/// Suffix of the simplified-JSON sibling routes.
pub const JSON_SUFFIX: &str = "JSON";

/// Which HTTP methods a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRule {
    Get,
    Post,
    GetOrPost,
}

impl MethodRule {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodRule::Get => method == Method::GET,
            MethodRule::Post => method == Method::POST,
            MethodRule::GetOrPost => method == Method::GET || method == Method::POST,
        }
    }
}

impl fmt::Display for MethodRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodRule::Get => "GET",
            MethodRule::Post => "POST",
            MethodRule::GetOrPost => "GET or POST",
        })
    }
}

/// What a route does once admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Daemon status and statistics.
    Status,
    /// Header-addressed dispatch to another route.
    Compat,
    /// Body forwarded as `operation` after `codec` handles it.
    Forward { operation: Operation, codec: Codec },
    /// `GET` builds the request from query parameters, `POST` forwards the body.
    ListTables,
    /// Table name taken from the last path element.
    TableByName(Operation),
    /// Operation name taken from the last path element, body forwarded raw.
    RawPost,
    /// Compares a table's status to the one requested, optionally polling.
    StatusTable,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: String,
    pub method: MethodRule,
    /// Number of `/`-separated elements the path must split into, counting
    /// the empty one before the leading slash.
    pub arity: Option<usize>,
    pub kind: RouteKind,
}

impl Route {
    fn new(pattern: impl Into<String>, method: MethodRule, arity: Option<usize>, kind: RouteKind) -> Self {
        Self {
            pattern: pattern.into(),
            method,
            arity,
            kind,
        }
    }

    /// True when `path` falls under this route's pattern.
    pub fn matches(&self, path: &str) -> bool {
        if self.pattern.ends_with('/') {
            path.starts_with(self.pattern.as_str())
        } else {
            path == self.pattern
        }
    }
}

/// Split `path` the way arity is counted: `"/a"` has 2 elements, `"/a/b"` has 3.
pub fn path_elements(path: &str) -> Vec<&str> {
    path.split('/').collect()
}

/// Immutable lookup tables built at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    exact: HashMap<String, usize>,
    operations: HashMap<Operation, usize>,
}

impl RouteTable {
    /// Register the daemon's routes.
    pub fn from_config(config: &RoutesConfig) -> Self {
        use MethodRule::*;

        let mut routes = vec![Route::new(STATUS_PATH, Get, None, RouteKind::Status)];

        routes.push(Route::new("/DescribeTable", Post, Some(2), validated(Operation::DescribeTable)));
        routes.push(Route::new(
            "/DescribeTable/",
            Get,
            Some(3),
            RouteKind::TableByName(Operation::DescribeTable),
        ));
        routes.push(Route::new("/ListTables", GetOrPost, Some(2), RouteKind::ListTables));

        for operation in [
            Operation::CreateTable,
            Operation::UpdateTable,
            Operation::PutItem,
            Operation::GetItem,
            Operation::BatchGetItem,
            Operation::BatchWriteItem,
            Operation::DeleteItem,
            Operation::UpdateItem,
            Operation::Query,
            Operation::Scan,
        ] {
            routes.push(Route::new(format!("/{operation}"), Post, Some(2), validated(operation)));
        }

        for operation in [
            Operation::PutItem,
            Operation::GetItem,
            Operation::BatchGetItem,
            Operation::BatchWriteItem,
        ] {
            routes.push(Route::new(
                format!("/{operation}{JSON_SUFFIX}"),
                Post,
                Some(2),
                RouteKind::Forward {
                    operation,
                    codec: Codec::Simplified,
                },
            ));
        }

        if config.enable_delete_table {
            routes.push(Route::new("/DeleteTable", Post, Some(2), validated(Operation::DeleteTable)));
            routes.push(Route::new(
                "/DeleteTable/",
                Get,
                Some(3),
                RouteKind::TableByName(Operation::DeleteTable),
            ));
        }

        routes.push(Route::new(STATUS_TABLE_PATH, Get, Some(3), RouteKind::StatusTable));
        routes.push(Route::new(RAW_POST_PATH, Post, Some(3), RouteKind::RawPost));
        routes.push(Route::new(COMPAT_PATH, GetOrPost, None, RouteKind::Compat));

        Self::new(routes)
    }

    /// Index a list of routes. Later duplicates of a pattern are ignored.
    pub fn new(routes: Vec<Route>) -> Self {
        let mut exact = HashMap::new();
        let mut operations = HashMap::new();
        for (index, route) in routes.iter().enumerate() {
            exact.entry(route.pattern.clone()).or_insert(index);
            // The dedicated `/<Operation>` route is the one the compat path invokes.
            if let Ok(operation) = route.pattern.trim_start_matches('/').parse::<Operation>() {
                operations.entry(operation).or_insert(index);
            }
        }
        Self {
            routes,
            exact,
            operations,
        }
    }

    /// Route for a request path.
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        if let Some(&index) = self.exact.get(path) {
            return Some(&self.routes[index]);
        }
        self.routes
            .iter()
            .filter(|route| route.pattern.ends_with('/') && route.matches(path))
            .max_by_key(|route| route.pattern.len())
    }

    /// Subtree route that `path` names without its trailing slash, as in
    /// `/StatusTable` for `/StatusTable/`.
    pub fn subtree_of(&self, path: &str) -> Option<&Route> {
        if path.is_empty() || path.ends_with('/') {
            return None;
        }
        self.exact
            .get(&format!("{path}/"))
            .map(|&index| &self.routes[index])
    }

    /// Route the compat path dispatches `operation` to.
    pub fn for_operation(&self, operation: Operation) -> Option<&Route> {
        self.operations.get(&operation).map(|&index| &self.routes[index])
    }

    /// Every registered pattern, in registration order.
    pub fn available_handlers(&self) -> Vec<String> {
        self.routes.iter().map(|route| route.pattern.clone()).collect()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

fn validated(operation: Operation) -> RouteKind {
    RouteKind::Forward {
        operation,
        codec: Codec::Validated,
    }
}
