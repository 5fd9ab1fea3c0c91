use super::Snapshot;
use bon::Builder;
use serde::{Deserialize, Serialize};

/// 机构快照
#[derive(Builder, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub institution_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Snapshot for Institution {
    const TYPE: &'static str = "Institution";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
