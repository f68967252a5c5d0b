//! Saída de terminal do webrtc-keeper: resumo colorido da configuração.
//!
//! Usa a crate `console` para estilização. A senha nunca é impressa.

use console::Style;

use crate::config::Settings;
use crate::reach::Reachability;

/// Linhas do resumo exibido por `webrtc-keeper check`.
pub fn summary(settings: &Settings) -> Vec<String> {
    let key = Style::new().cyan();
    let value = Style::new().bold();
    let muted = Style::new().dim();

    let whitelist = if settings.whitelist.is_empty() {
        muted.apply_to("(empty, no call will be answered)").to_string()
    } else {
        value.apply_to(settings.whitelist.sorted().join(", ")).to_string()
    };

    let chrome = match &settings.chrome_path {
        Some(path) => value.apply_to(path.display()).to_string(),
        None => muted.apply_to("auto-detected").to_string(),
    };

    let row = |name: &str, shown: String| format!("  {:<16} {shown}", key.apply_to(name));
    vec![
        row("dashboard", value.apply_to(&settings.credentials.base_url).to_string()),
        row("user", value.apply_to(&settings.credentials.username).to_string()),
        row("password", muted.apply_to("<redacted>").to_string()),
        row("whitelist", whitelist),
        row(
            "chrome",
            format!(
                "{chrome} {}",
                muted.apply_to(if settings.headless { "(headless)" } else { "(windowed)" })
            ),
        ),
        row("verify", value.apply_to(settings.daily_verify).to_string()),
        row("clear queue", value.apply_to(settings.hourly_clear).to_string()),
        row("check calls", value.apply_to(settings.check_every).to_string()),
        row(
            "answer wait",
            value.apply_to(format!("{}s", settings.answer_wait.as_secs_f64())).to_string(),
        ),
    ]
}

/// Imprime o resumo com um cabeçalho verde.
pub fn print_summary(settings: &Settings) {
    let green = Style::new().green().bold();
    println!("{} configuration is valid", green.apply_to("✓"));
    for line in summary(settings) {
        println!("{line}");
    }
}

/// Linha do resultado de `check --online`.
pub fn reachability_line(reach: &Reachability) -> String {
    let (mark, style) = if reach.is_ready() {
        ("✓", Style::new().green().bold())
    } else {
        ("✗", Style::new().red().bold())
    };
    let form = if reach.login_form {
        "login form found"
    } else {
        "no login form"
    };
    format!(
        "{} {} answered {} ({form})",
        style.apply_to(mark),
        reach.url,
        reach.status
    )
}

pub fn print_reachability(reach: &Reachability) {
    println!("{}", reachability_line(reach));
}
