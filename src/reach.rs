//! Plain HTTP look at the dashboard login page, without a browser.
//!
//! Used by `check --online` to tell "the dashboard is down" apart from "Chrome
//! cannot log in" before the daemon is started.

use std::time::Duration;

use reqwest::Client;
use tokio::runtime::Builder;
use tracing::debug;

use crate::config::Credentials;
use crate::dashboard;
use crate::error::KeeperError;
use crate::keeper::LOGIN_PATH;

/// What the login page answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    pub url: String,
    pub status: u16,
    /// The page carries the username field the keeper fills in.
    pub login_form: bool,
}

impl Reachability {
    pub fn is_ready(&self) -> bool {
        (200..300).contains(&self.status) && self.login_form
    }
}

pub async fn login_page(client: &Client, base_url: &str) -> Result<Reachability, KeeperError> {
    let url = format!("{base_url}{LOGIN_PATH}");
    let response = client.get(&url).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    debug!(%url, status, bytes = body.len(), "login page fetched");
    Ok(Reachability {
        login_form: dashboard::has_login_form(&body),
        url,
        status,
    })
}

/// Blocking wrapper for the command line.
pub fn check_login_page(credentials: &Credentials) -> Result<Reachability, KeeperError> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()?;
    runtime.block_on(login_page(&client, &credentials.base_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_HTML: &str = r#"<html><body><form>
        <input name="username"><input name="password" type="password">
        <button id="btn-login">Login</button>
    </form></body></html>"#;

    #[tokio::test]
    async fn login_page_with_form_is_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let reach = login_page(&Client::new(), &server.uri()).await.unwrap();
        assert_eq!(reach.status, 200);
        assert!(reach.login_form);
        assert!(reach.is_ready());
        assert!(reach.url.ends_with("/index.php"));
    }

    #[tokio::test]
    async fn error_page_is_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.php"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let reach = login_page(&Client::new(), &server.uri()).await.unwrap();
        assert_eq!(reach.status, 503);
        assert!(!reach.login_form);
        assert!(!reach.is_ready());
    }

    #[tokio::test]
    async fn unreachable_host_is_an_http_error() {
        let err = login_page(&Client::new(), "http://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, KeeperError::Http(_)));
    }
}
