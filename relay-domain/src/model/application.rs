use super::{Snapshot, User};
use serde::{Deserialize, Serialize};

/// 第三方应用账号快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(flatten)]
    pub account: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
}

impl Snapshot for Application {
    const TYPE: &'static str = "Application";

    fn id(&self) -> Option<&str> {
        self.account.id.as_deref()
    }
}
