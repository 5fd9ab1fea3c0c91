use super::{Snapshot, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Educator {
    #[serde(flatten)]
    pub account: User,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_groups: Vec<String>,
}

impl Snapshot for Educator {
    const TYPE: &'static str = "Educator";

    fn id(&self) -> Option<&str> {
        self.account.id.as_deref()
    }
}
