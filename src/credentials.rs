use serde::{Deserialize, Serialize};

/// Opaque authentication material presented on `connect` and `refresh`.
///
/// The client never inspects these fields; it only serializes them into command params and hands
/// freshly obtained ones back from `OnRefresh`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub timestamp: String,
    #[serde(default)]
    pub info: String,
    pub token: String,
}

impl Credentials {
    pub fn new(
        user: impl Into<String>,
        timestamp: impl Into<String>,
        info: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self { user: user.into(), timestamp: timestamp.into(), info: info.into(), token: token.into() }
    }
}
