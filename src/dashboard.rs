//! Reading the dashboard document.
//!
//! A logged-in dashboard greets the user in its first `<h3>`:
//! `Welcome {username}`. That banner is the only session marker we trust.

use scraper::{Html, Selector};

use crate::keeper::USERNAME_FIELD;

/// Text of the first `<h3>` on the page, whitespace-trimmed.
pub fn welcome_banner(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("h3") else {
        return None;
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_owned())
}

/// True when the page carries the login form's username field.
pub fn has_login_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    Selector::parse(USERNAME_FIELD)
        .is_ok_and(|selector| document.select(&selector).next().is_some())
}

/// The banner we expect for `username`.
fn expected_banner(username: &str) -> String {
    format!("Welcome {username}")
}

/// True when `banner` greets exactly `username`.
pub fn greets(banner: &str, username: &str) -> bool {
    banner == expected_banner(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGGED_IN: &str = r#"
        <html><body>
          <div class="dashboard">
            <h3>
              Welcome alice
            </h3>
            <h3>Widgets</h3>
          </div>
        </body></html>
    "#;

    #[test]
    fn banner_is_first_h3_trimmed() {
        assert_eq!(welcome_banner(LOGGED_IN).as_deref(), Some("Welcome alice"));
    }

    #[test]
    fn greets_configured_user() {
        let banner = welcome_banner(LOGGED_IN).unwrap();
        assert!(greets(&banner, "alice"));
    }

    #[test]
    fn other_user_is_a_mismatch() {
        let banner = welcome_banner(LOGGED_IN).unwrap();
        assert!(!greets(&banner, "bob"));
        assert!(!greets(&banner, "alic"));
    }

    #[test]
    fn login_page_has_no_banner() {
        let login = r#"<html><body><form><input name="username"></form></body></html>"#;
        assert!(welcome_banner(login).is_none());
        assert!(has_login_form(login));
        assert!(!has_login_form(LOGGED_IN));
    }
}
