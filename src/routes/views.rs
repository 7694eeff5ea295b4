use axum::response::Html;

use crate::auth::repo_types::SessionUser;
use crate::calculator::rates::WasteClass;
use crate::calculator::repo_types::Calculation;
use crate::routes::flash::{Flash, FlashKind};

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&SessionUser>, flash: Option<&Flash>, body: &str) -> Html<String> {
    let nav = match user {
        Some(u) => format!(
            r#"<span class="user">{}</span> <a href="/waste-calculator">Калькулятор</a> <a href="/logout">Выйти</a>"#,
            escape(&u.email)
        ),
        None => r#"<a href="/login">Войти</a> <a href="/register">Регистрация</a>"#.to_string(),
    };
    let flash = flash
        .map(|f| {
            let class = match f.kind {
                FlashKind::Success => "success",
                FlashKind::Error => "error",
            };
            format!(r#"<div class="flash {class}">{}</div>"#, escape(&f.message))
        })
        .unwrap_or_default();
    Html(format!(
        r#"<!doctype html>
<html lang="ru">
<head><meta charset="utf-8"><title>{title} · ФГИС ОПВК</title></head>
<body>
<nav><a href="/">Главная</a> {nav}</nav>
{flash}
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

pub fn index_page(user: Option<&SessionUser>, flash: Option<&Flash>) -> Html<String> {
    let greeting = match user {
        Some(u) => format!("<p>Вы вошли как {}.</p>", escape(&u.email)),
        None => "<p>Войдите, чтобы рассчитать стоимость утилизации отходов.</p>".to_string(),
    };
    layout(
        "Главная",
        user,
        flash,
        &format!("<h1>Цифровой помощник ФГИС ОПВК</h1>\n{greeting}"),
    )
}

pub fn login_page(flash: Option<&Flash>) -> Html<String> {
    layout(
        "Авторизация",
        None,
        flash,
        r#"<h1>Авторизация</h1>
<form method="post" action="/login">
<label>Почта <input type="email" name="email" required></label>
<label>Пароль <input type="password" name="password" required></label>
<label><input type="checkbox" name="remember_me" value="on"> Запомнить меня</label>
<button type="submit">Войти</button>
</form>"#,
    )
}

pub fn register_page(flash: Option<&Flash>) -> Html<String> {
    layout(
        "Регистрация",
        None,
        flash,
        r#"<h1>Регистрация</h1>
<form method="post" action="/register">
<label>Почта <input type="email" name="email" required></label>
<label>Имя пользователя <input type="text" name="name" required></label>
<label>Пароль <input type="password" name="password" required></label>
<label>Повторите пароль <input type="password" name="password_again" required></label>
<button type="submit">Зарегистрироваться</button>
</form>"#,
    )
}

pub fn calculator_page(
    user: &SessionUser,
    flash: Option<&Flash>,
    entries: &[Calculation],
) -> Html<String> {
    let options: String = WasteClass::ALL
        .iter()
        .map(|c| format!(r#"<option value="{}">{}</option>"#, c.code(), c.label()))
        .collect();

    let rows: String = entries
        .iter()
        .map(|e| {
            format!(
                r#"<tr><td>{}</td><td class="price">{:.2}</td><td class="class">{}</td><td class="volume">{}</td></tr>"#,
                crate::calculator::ledger::format_timestamp(e.created_at),
                e.price,
                escape(&e.waste_class),
                e.volume_display(),
            )
        })
        .collect();
    let history = if entries.is_empty() {
        "<p>История расчётов пуста.</p>".to_string()
    } else {
        format!(
            "<table>\n<tr><th>Дата</th><th>Стоимость, руб.</th><th>Класс</th><th>Объём, т</th></tr>\n{rows}\n</table>"
        )
    };

    layout(
        "Расчёт стоимости утилизации",
        Some(user),
        flash,
        &format!(
            r#"<h1>Расчёт стоимости утилизации</h1>
<form method="post" action="/waste-calculator">
<label>Класс отходов <select name="waste_class">{options}</select></label>
<label>Объём, т <input type="text" name="volume" inputmode="decimal" required></label>
<button type="submit">Рассчитать</button>
</form>
<h2>История</h2>
{history}
<p><a href="/waste-calculator/export">Скачать историю</a></p>"#
        ),
    )
}

pub fn error_page(message: &str) -> Html<String> {
    layout("Ошибка", None, None, &format!("<h1>{}</h1>", escape(message)))
}
