pub const VALID_USER_ID: &str = "admin";
pub const VALID_PASSWORD: &str = "password";

pub const MISSING_CREDENTIALS: &str = "Please enter both userID and Password";
pub const INVALID_CREDENTIALS: &str = "Invalid UserID or password";

pub fn check_credentials(user_id: &str, password: &str) -> bool {
    user_id == VALID_USER_ID && password == VALID_PASSWORD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub user_id: String,
    pub password: String,
    pub error: Option<String>,
    pub show_password: bool,
}

impl LoginForm {
    pub fn submit(&mut self) -> LoginOutcome {
        if self.user_id.is_empty() || self.password.is_empty() {
            self.error = Some(MISSING_CREDENTIALS.to_string());
            return LoginOutcome::Rejected;
        }
        if check_credentials(&self.user_id, &self.password) {
            self.error = None;
            tracing::info!(user = %self.user_id, "login accepted");
            LoginOutcome::Accepted
        } else {
            self.error = Some(INVALID_CREDENTIALS.to_string());
            tracing::warn!(user = %self.user_id, "login rejected");
            LoginOutcome::Rejected
        }
    }

    pub fn toggle_password_visibility(&mut self) {
        self.show_password = !self.show_password;
    }

    pub fn masked_password(&self) -> String {
        if self.show_password {
            self.password.clone()
        } else {
            "*".repeat(self.password.chars().count())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_masked_by_default() {
        let mut form = LoginForm {
            password: "secret".to_string(),
            ..LoginForm::default()
        };
        assert_eq!(form.masked_password(), "******");
        form.toggle_password_visibility();
        assert_eq!(form.masked_password(), "secret");
    }
}
