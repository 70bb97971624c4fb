//! Endpoint HTTP adapter.
//!
//! The host forwards a complete raw HTTP request inside the envelope. This
//! module parses it into an [`HttpRequest`] and selects the declared route
//! whose method allow-list and path pattern both match.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

/// A parsed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    /// Request target as sent, query string included.
    pub path: String,
    /// Header names keep their original case.
    pub headers: HashMap<String, String>,
    /// Query parameters of the target, undecoded.
    pub query: HashMap<String, String>,
    pub body: String,
}

impl HttpRequest {
    /// Path without the query string.
    pub fn path_only(&self) -> &str {
        strip_query(&self.path)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a raw HTTP/1.1 request.
///
/// Lines are separated by `\r\n`. The request line is split on single
/// spaces into method and target, defaulting to `GET` and `/`. Header lines
/// are split on the first `": "`; lines without it are skipped. The first
/// empty line ends the headers and everything after it is the body.
pub fn parse_raw_http_request(raw: &str) -> HttpRequest {
    let (head, body) = match raw.find("\r\n\r\n") {
        Some(idx) => (&raw[..idx], &raw[idx + 4..]),
        None => (raw, ""),
    };

    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let method = match parts.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "GET".to_string(),
    };
    let path = match parts.next() {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => "/".to_string(),
    };

    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let query = parse_query(&path);

    HttpRequest {
        method,
        path,
        headers,
        query,
        body: body.to_string(),
    }
}

fn strip_query(target: &str) -> &str {
    target.split_once('?').map_or(target, |(p, _)| p)
}

fn parse_query(target: &str) -> HashMap<String, String> {
    let Some((_, qs)) = target.split_once('?') else {
        return HashMap::new();
    };
    qs.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Path patterns
// ---------------------------------------------------------------------------

/// A compiled `/segment/:param` pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
    param_names: Vec<String>,
}

/// Result of matching a path against a [`PathPattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub matched: bool,
    pub params: HashMap<String, String>,
}

impl PathPattern {
    /// Compile `pattern`. `:name` segments become capture groups; every
    /// other character matches literally. An empty pattern means `/`.
    pub fn compile(pattern: &str) -> Result<Self, PluginError> {
        let source = if pattern.is_empty() { "/" } else { pattern };
        let param = Regex::new(r":(\w+)")
            .map_err(|e| PluginError::LoadFailed(format!("path param regex: {e}")))?;

        let mut expr = String::from("^");
        let mut param_names = Vec::new();
        let mut last = 0;
        for caps in param.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            expr.push_str(&regex::escape(&source[last..whole.start()]));
            expr.push_str("([^/]+)");
            param_names.push(name.as_str().to_string());
            last = whole.end();
        }
        expr.push_str(&regex::escape(&source[last..]));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| {
            PluginError::LoadFailed(format!("invalid endpoint path '{pattern}': {e}"))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            param_names,
        })
    }

    /// The pattern as declared.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The anchored expression the pattern compiled to.
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    /// Parameter names in order of appearance.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a request path. The query string is ignored.
    pub fn match_path(&self, path: &str) -> PathMatch {
        let Some(caps) = self.regex.captures(strip_query(path)) else {
            return PathMatch::default();
        };
        let params = self
            .param_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| caps.get(i + 1).map(|m| (name.clone(), m.as_str().to_string())))
            .collect();
        PathMatch {
            matched: true,
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// One declared endpoint: a path pattern, allowed methods and a target.
#[derive(Debug, Clone)]
pub struct EndpointRoute<T> {
    pub pattern: PathPattern,
    pub methods: Vec<String>,
    pub target: T,
}

impl<T> EndpointRoute<T> {
    /// Case-insensitive check against the allow-list.
    pub fn matches_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// A matched route and the parameters extracted from the path.
#[derive(Debug)]
pub struct EndpointMatch<'a, T> {
    pub route: &'a EndpointRoute<T>,
    pub params: HashMap<String, String>,
}

/// Declared endpoint routes, checked in declaration order.
#[derive(Debug, Clone)]
pub struct EndpointTable<T> {
    routes: Vec<EndpointRoute<T>>,
}

impl<T> Default for EndpointTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> EndpointTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route.
    pub fn add(&mut self, path: &str, methods: Vec<String>, target: T) -> Result<(), PluginError> {
        self.routes.push(EndpointRoute {
            pattern: PathPattern::compile(path)?,
            methods,
            target,
        });
        Ok(())
    }

    pub fn routes(&self) -> &[EndpointRoute<T>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route matching both method and path. `None` is a 404.
    pub fn dispatch(&self, request: &HttpRequest) -> Option<EndpointMatch<'_, T>> {
        self.routes.iter().find_map(|route| {
            if !route.matches_method(&request.method) {
                return None;
            }
            let m = route.pattern.match_path(&request.path);
            m.matched.then(|| EndpointMatch {
                route,
                params: m.params,
            })
        })
    }
}
