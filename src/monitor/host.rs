use serde::{Deserialize, Serialize};

/// A server watched by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// IP address or host name.
    pub address: String,
    /// The name the server is known by, e.g. "Systems NAS".
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Path appended to the web address, e.g. "/cgi-bin/login.html".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, rename = "tls")]
    pub use_tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    80
}

impl Host {
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
            port: default_port(),
            credentials: None,
            path: None,
            use_tls: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// The web address checked by the HTTP probe.
    pub fn url(&self) -> String {
        self.build_url(false)
    }

    /// The web address with any password masked, safe to put in notifications.
    pub fn redacted_url(&self) -> String {
        self.build_url(true)
    }

    fn build_url(&self, redact: bool) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        let userinfo = match &self.credentials {
            Some(c) if c.user.is_empty() => String::new(),
            Some(c) if c.password.is_empty() => format!("{}@", c.user),
            Some(c) if redact => format!("{}:****@", c.user),
            Some(c) => format!("{}:{}@", c.user, c.password),
            None => String::new(),
        };
        let path = match self.path.as_deref() {
            None | Some("") => String::new(),
            Some(p) if p.starts_with('/') => p.to_string(),
            Some(p) => format!("/{}", p),
        };
        format!("{}://{}{}:{}{}", scheme, userinfo, self.address, self.port, path)
    }
}
