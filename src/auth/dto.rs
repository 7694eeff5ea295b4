use serde::Deserialize;

/// `POST /register` form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub password: String,
    pub password_again: String,
}

/// `POST /login` form. `remember_me` is an HTML checkbox: absent when unchecked.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: Option<String>,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        matches!(
            self.remember_me.as_deref().map(str::trim),
            Some("on" | "y" | "yes" | "true" | "1")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(remember_me: Option<&str>) -> LoginForm {
        LoginForm {
            email: "a@b.c".into(),
            password: "x".into(),
            remember_me: remember_me.map(Into::into),
        }
    }

    #[test]
    fn remember_checkbox_values() {
        assert!(form(Some("on")).remember());
        assert!(form(Some("y")).remember());
        assert!(form(Some("true")).remember());
        assert!(!form(None).remember());
        assert!(!form(Some("")).remember());
        assert!(!form(Some("false")).remember());
    }
}
