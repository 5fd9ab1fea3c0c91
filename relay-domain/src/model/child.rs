use super::{Snapshot, User};
use serde::{Deserialize, Serialize};

/// 儿童账号快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Child {
    #[serde(flatten)]
    pub account: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// 年龄计算日期（YYYY-MM-DD）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_calc_date: Option<String>,
}

impl Snapshot for Child {
    const TYPE: &'static str = "Child";

    fn id(&self) -> Option<&str> {
        self.account.id.as_deref()
    }
}
