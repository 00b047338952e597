//! Endpoint variants and the fallback loop that walks them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    ListHouses,
    QueryThermostat,
    QueryVentilation,
    WriteThermostat,
    WriteVentilation,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Login,
        Operation::ListHouses,
        Operation::QueryThermostat,
        Operation::QueryVentilation,
        Operation::WriteThermostat,
        Operation::WriteVentilation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::ListHouses => "list_houses",
            Operation::QueryThermostat => "query_thermostat",
            Operation::QueryVentilation => "query_ventilation",
            Operation::WriteThermostat => "write_thermostat",
            Operation::WriteVentilation => "write_ventilation",
        }
    }

    pub fn requires_auth(&self) -> bool {
        *self != Operation::Login
    }

    fn default_paths(&self) -> &'static [&'static str] {
        match self {
            Operation::Login => &["user/login/{username}/{password_hash}"],
            Operation::ListHouses => &["casa/elenco2/{user_id}"],
            Operation::QueryThermostat => &["sync/cronos380"],
            Operation::QueryVentilation => &["sync/cronos400"],
            Operation::WriteThermostat => &["C800/scrivi/"],
            Operation::WriteVentilation => &["eco/send/"],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values substituted into path templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathVars<'a> {
    pub username: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

/// Ordered path templates per operation, relative to the API folder.
///
/// Templates may contain `{username}`, `{password_hash}` and `{user_id}`.
#[derive(Debug, Clone)]
pub struct EndpointPlan {
    paths: HashMap<Operation, Vec<String>>,
}

impl Default for EndpointPlan {
    fn default() -> Self {
        let paths = Operation::ALL
            .into_iter()
            .map(|op| {
                let variants = op.default_paths().iter().map(|p| p.to_string()).collect();
                (op, variants)
            })
            .collect();
        Self { paths }
    }
}

impl EndpointPlan {
    /// Replaces the variant list for `operation`; earlier entries are tried first.
    pub fn with_variants<I, S>(mut self, operation: Operation, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths
            .insert(operation, variants.into_iter().map(Into::into).collect());
        self
    }

    pub fn variants(&self, operation: Operation) -> &[String] {
        self.paths.get(&operation).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn render(&self, operation: Operation, vars: PathVars<'_>) -> Vec<String> {
        self.variants(operation)
            .iter()
            .map(|template| render_template(template, vars))
            .collect()
    }
}

fn render_template(template: &str, vars: PathVars<'_>) -> String {
    let mut path = template.to_string();
    for (placeholder, value) in [
        ("{username}", vars.username),
        ("{password_hash}", vars.password_hash),
        ("{user_id}", vars.user_id),
    ] {
        if let Some(value) = value {
            path = path.replace(placeholder, value);
        }
    }
    path
}

/// Tries `attempt` against each URL in order.
///
/// An authentication failure ends the walk at once: another path will not fix
/// credentials. Any other failure moves on to the next variant. When every
/// variant fails, the most recent error is returned.
pub async fn negotiate<T, F, Fut>(operation: Operation, urls: Vec<String>, mut attempt: F) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = urls.len();
    let mut last_error = None;

    for (index, url) in urls.into_iter().enumerate() {
        match attempt(url.clone()).await {
            Ok(value) => {
                if index > 0 {
                    debug!(%operation, %url, variant = index, "endpoint variant succeeded");
                }
                return Ok(value);
            }
            Err(e) if e.is_authentication_failure() => return Err(e),
            Err(e) => {
                warn!(%operation, %url, variant = index, total, error = %e, "endpoint variant failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(Error::NoEndpoint(operation)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("/v{i}")).collect()
    }

    #[test]
    fn default_plan_renders_login() {
        let plan = EndpointPlan::default();
        let rendered = plan.render(
            Operation::Login,
            PathVars {
                username: Some("me@example.com"),
                password_hash: Some("abc"),
                user_id: None,
            },
        );
        assert_eq!(rendered, vec!["user/login/me@example.com/abc"]);
        assert_eq!(
            plan.render(Operation::ListHouses, PathVars { user_id: Some("9"), ..Default::default() }),
            vec!["casa/elenco2/9"]
        );
    }

    #[test]
    fn variants_are_replaceable() {
        let plan = EndpointPlan::default()
            .with_variants(Operation::QueryThermostat, ["sync/cronos380", "mono/sync/cronos380"]);
        assert_eq!(plan.variants(Operation::QueryThermostat).len(), 2);
        let plan = plan.with_variants(Operation::Login, Vec::<String>::new());
        assert!(plan.variants(Operation::Login).is_empty());
    }

    #[tokio::test]
    async fn returns_first_success() {
        let tried = RefCell::new(Vec::new());
        let result = negotiate(Operation::ListHouses, urls(3), |url| {
            tried.borrow_mut().push(url.clone());
            async move {
                if url == "/v2" {
                    Ok(url)
                } else {
                    Err(Error::Timeout)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "/v2");
        assert_eq!(tried.borrow().len(), 3);
    }

    #[tokio::test]
    async fn surfaces_last_failure() {
        let result: Result<()> = negotiate(Operation::ListHouses, urls(3), |url| async move {
            match url.as_str() {
                "/v0" => Err(Error::Timeout),
                "/v1" => Err(Error::UnexpectedPayload("v1".into())),
                _ => Err(Error::HttpStatus(502)),
            }
        })
        .await;
        assert!(matches!(result, Err(Error::HttpStatus(502))));
    }

    #[tokio::test]
    async fn stops_on_authentication_failure() {
        let tried = RefCell::new(0);
        let result: Result<()> = negotiate(Operation::ListHouses, urls(3), |_| {
            *tried.borrow_mut() += 1;
            async { Err(Error::AuthenticationFailed("expired".into())) }
        })
        .await;
        assert!(result.unwrap_err().is_authentication_failure());
        assert_eq!(*tried.borrow(), 1);
    }

    #[tokio::test]
    async fn empty_plan_is_protocol_error() {
        let result: Result<()> = negotiate(Operation::Login, vec![], |_| async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::NoEndpoint(Operation::Login))));
    }
}
