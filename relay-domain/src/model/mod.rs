//! 领域快照（model）
//!
//! 集成事件中携带的外部领域对象快照。每种类型自带 JSON ↔ 模型的重建逻辑，
//! 未知字段被忽略，缺失的可选字段视为 `None`。
//!
mod application;
mod child;
mod educator;
mod family;
mod health_professional;
mod institution;
mod user;

pub use application::Application;
pub use child::Child;
pub use educator::Educator;
pub use family::Family;
pub use health_professional::HealthProfessional;
pub use institution::Institution;
pub use user::User;

use crate::error::{RelayError, RelayResult};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt::Debug;

/// 领域快照：可从事件 JSON 重建，也可序列化回 JSON
pub trait Snapshot:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    /// 快照类型名（用于日志与错误信息）
    const TYPE: &'static str;

    fn id(&self) -> Option<&str>;

    /// 从 JSON 重建模型，要求输入为对象
    fn from_json(value: &Value) -> RelayResult<Self> {
        if !value.is_object() {
            return Err(RelayError::InvalidValue {
                reason: format!("{} snapshot must be a JSON object", Self::TYPE),
            });
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    fn to_json(&self) -> RelayResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_from_json_ignores_unknown_fields() {
        let user = User::from_json(&json!({
            "id": "5a62be07d6f33400146c9b61",
            "username": "BR9999",
            "type": "child",
            "password": "must-not-leak",
        }))
        .unwrap();
        assert_eq!(user.id(), Some("5a62be07d6f33400146c9b61"));
        assert_eq!(user.username.as_deref(), Some("BR9999"));
        assert_eq!(user.user_type.as_deref(), Some("child"));
        assert!(user.to_json().unwrap().get("password").is_none());
    }

    #[test]
    fn non_object_snapshot_is_rejected() {
        let err = Child::from_json(&json!("not an object")).unwrap_err();
        assert!(matches!(err, RelayError::InvalidValue { .. }));
    }

    #[test]
    fn child_flattens_account_fields() {
        let value = json!({
            "id": "c-1",
            "username": "child01",
            "institution_id": "i-1",
            "gender": "male",
            "age": 11,
        });
        let child = Child::from_json(&value).unwrap();
        assert_eq!(child.account.username.as_deref(), Some("child01"));
        assert_eq!(child.account.institution_id.as_deref(), Some("i-1"));
        assert_eq!(child.age, Some(11));

        let back = child.to_json().unwrap();
        assert_eq!(back["username"], "child01");
        assert_eq!(back["gender"], "male");
        assert!(back.get("age_calc_date").is_none());
    }

    #[test]
    fn institution_keeps_coordinates() {
        let inst = Institution::from_json(&json!({
            "id": "i-1",
            "type": "Institute of Scientific Research",
            "name": "NUTES",
            "latitude": -7.2100,
            "longitude": -35.9150,
        }))
        .unwrap();
        assert_eq!(inst.name.as_deref(), Some("NUTES"));
        assert_eq!(inst.latitude, Some(-7.21));
        assert!(inst.address.is_none());
    }
}
