//! Settings for opening a [`Store`](crate::Store).

use std::env;

use crate::codec::Registry;

const DEFAULT_NAME: &str = "git_store";
const DEFAULT_EMAIL: &str = "git_store@localhost";

/// How a store picks its branch, who it commits as, and which value codecs
/// it uses.
#[derive(Clone, Debug)]
pub struct Config {
    /// Branch to read and commit to. `None` follows `HEAD`, or `master` if
    /// `HEAD` is missing or detached.
    pub branch: Option<String>,

    /// Identity used by [`Store::commit`](crate::Store::commit).
    pub author_name: String,
    pub author_email: String,

    pub codecs: Registry,
}

impl Config {
    /// Defaults overridden by `GIT_STORE_BRANCH`, `GIT_AUTHOR_NAME` and
    /// `GIT_AUTHOR_EMAIL` when they are set and non-empty.
    pub fn from_env() -> Config {
        let mut config = Config::default();
        if let Some(branch) = non_empty_var("GIT_STORE_BRANCH") {
            config.branch = Some(branch);
        }
        if let Some(name) = non_empty_var("GIT_AUTHOR_NAME") {
            config.author_name = name;
        }
        if let Some(email) = non_empty_var("GIT_AUTHOR_EMAIL") {
            config.author_email = email;
        }
        config
    }

    pub fn branch<S: Into<String>>(mut self, branch: S) -> Config {
        self.branch = Some(branch.into());
        self
    }

    pub fn author<N: Into<String>, E: Into<String>>(mut self, name: N, email: E) -> Config {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub fn codecs(mut self, codecs: Registry) -> Config {
        self.codecs = codecs;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            branch: None,
            author_name: DEFAULT_NAME.to_string(),
            author_email: DEFAULT_EMAIL.to_string(),
            codecs: Registry::standard(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
