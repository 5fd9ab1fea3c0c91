use super::{Snapshot, User};
use serde::{Deserialize, Serialize};

/// 家庭账号快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Family {
    #[serde(flatten)]
    pub account: User,
    /// 关联的儿童 ID
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl Snapshot for Family {
    const TYPE: &'static str = "Family";

    fn id(&self) -> Option<&str> {
        self.account.id.as_deref()
    }
}
