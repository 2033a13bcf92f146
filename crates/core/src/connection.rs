use std::fmt;

/// Credentials and target of the database being dumped or restored.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: String,
    name: String,
    user: String,
    password: String,
}

impl ConnectionDescriptor {
    pub fn new(
        host: impl Into<String>,
        name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

// Keeps the password out of logs and panic messages.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionDescriptor;

    #[test]
    fn debug_output_masks_password() {
        let conn = ConnectionDescriptor::new("localhost", "shop", "admin", "hunter2");
        let rendered = format!("{conn:?}");
        assert!(rendered.contains("localhost"));
        assert!(!rendered.contains("hunter2"));
    }
}
