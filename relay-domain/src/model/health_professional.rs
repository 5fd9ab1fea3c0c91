use super::{Snapshot, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthProfessional {
    #[serde(flatten)]
    pub account: User,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_groups: Vec<String>,
}

impl Snapshot for HealthProfessional {
    const TYPE: &'static str = "HealthProfessional";

    fn id(&self) -> Option<&str> {
        self.account.id.as_deref()
    }
}
