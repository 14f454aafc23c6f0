use std::{fmt, sync::Arc, time::Duration};

use fusion_core::{Authenticator, Authorizer, Info, ResourceConfig, SessionManager};

/// How the session cookie is written on login and cleared on logout.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age: Duration,
}

impl CookieSettings {
    pub const DEFAULT_NAME: &'static str = "fusion_session";

    pub fn new(name: impl Into<String>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            secure: false,
            max_age,
        }
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn issue(&self, token: &str) -> String {
        self.render(token, self.max_age.as_secs())
    }

    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            self.name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub sessions: Arc<SessionManager>,
    /// Global authorization hooks
    pub authorizer: Arc<Authorizer>,
    pub cookie: Arc<CookieSettings>,
    pub info: Arc<Info>,
    pub info_access: ResourceConfig,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("cookie", &self.cookie.name)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(authenticator: Authenticator, sessions: SessionManager) -> Self {
        let cookie = CookieSettings::new(CookieSettings::DEFAULT_NAME, sessions.ttl());
        Self {
            authenticator: Arc::new(authenticator),
            sessions: Arc::new(sessions),
            authorizer: Arc::new(Authorizer::default()),
            cookie: Arc::new(cookie),
            info: Arc::new(Info::new("fusion", env!("CARGO_PKG_VERSION"))),
            info_access: ResourceConfig::public(),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    pub fn with_cookie(mut self, cookie: CookieSettings) -> Self {
        self.cookie = Arc::new(cookie);
        self
    }

    pub fn with_info(mut self, info: Info, access: ResourceConfig) -> Self {
        self.info = Arc::new(info);
        self.info_access = access;
        self
    }
}
