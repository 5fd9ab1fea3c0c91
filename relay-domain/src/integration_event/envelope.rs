use super::{EVENT_NAME_FIELD, EventKind, Reconstruction, TIMESTAMP_FIELD};
use crate::error::{RelayError, RelayResult};
use crate::model::{
    Application, Child, Educator, Family, HealthProfessional, Institution, Snapshot, User,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// 事件负载：每种已知事件对应一种类型化的领域快照
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    UserDelete(User),
    ChildUpdate(Child),
    FamilyUpdate(Family),
    EducatorUpdate(Educator),
    HealthProfessionalUpdate(HealthProfessional),
    ApplicationUpdate(Application),
    InstitutionDelete(Institution),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::UserDelete(_) => EventKind::UserDelete,
            EventPayload::ChildUpdate(_) => EventKind::ChildUpdate,
            EventPayload::FamilyUpdate(_) => EventKind::FamilyUpdate,
            EventPayload::EducatorUpdate(_) => EventKind::EducatorUpdate,
            EventPayload::HealthProfessionalUpdate(_) => EventKind::HealthProfessionalUpdate,
            EventPayload::ApplicationUpdate(_) => EventKind::ApplicationUpdate,
            EventPayload::InstitutionDelete(_) => EventKind::InstitutionDelete,
        }
    }

    /// 负载中领域对象的 ID
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            EventPayload::UserDelete(v) => v.id(),
            EventPayload::ChildUpdate(v) => v.id(),
            EventPayload::FamilyUpdate(v) => v.id(),
            EventPayload::EducatorUpdate(v) => v.id(),
            EventPayload::HealthProfessionalUpdate(v) => v.id(),
            EventPayload::ApplicationUpdate(v) => v.id(),
            EventPayload::InstitutionDelete(v) => v.id(),
        }
    }

    fn to_json(&self) -> RelayResult<Value> {
        match self {
            EventPayload::UserDelete(v) => v.to_json(),
            EventPayload::ChildUpdate(v) => v.to_json(),
            EventPayload::FamilyUpdate(v) => v.to_json(),
            EventPayload::EducatorUpdate(v) => v.to_json(),
            EventPayload::HealthProfessionalUpdate(v) => v.to_json(),
            EventPayload::ApplicationUpdate(v) => v.to_json(),
            EventPayload::InstitutionDelete(v) => v.to_json(),
        }
    }

    /// 按事件种类选择对应领域类型的重建逻辑
    pub(crate) fn from_json(kind: EventKind, value: &Value) -> RelayResult<Self> {
        Ok(match kind {
            EventKind::UserDelete => EventPayload::UserDelete(User::from_json(value)?),
            EventKind::ChildUpdate => EventPayload::ChildUpdate(Child::from_json(value)?),
            EventKind::FamilyUpdate => EventPayload::FamilyUpdate(Family::from_json(value)?),
            EventKind::EducatorUpdate => EventPayload::EducatorUpdate(Educator::from_json(value)?),
            EventKind::HealthProfessionalUpdate => {
                EventPayload::HealthProfessionalUpdate(HealthProfessional::from_json(value)?)
            }
            EventKind::ApplicationUpdate => {
                EventPayload::ApplicationUpdate(Application::from_json(value)?)
            }
            EventKind::InstitutionDelete => {
                EventPayload::InstitutionDelete(Institution::from_json(value)?)
            }
        })
    }
}

/// 集成事件信封：构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationEvent {
    timestamp: DateTime<Utc>,
    payload: EventPayload,
}

impl IntegrationEvent {
    /// 以当前时间创建事件
    pub fn new(payload: EventPayload) -> Self {
        Self::with_timestamp(payload, Utc::now())
    }

    pub fn with_timestamp(payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, payload }
    }

    pub fn user_delete(user: User) -> Self {
        Self::new(EventPayload::UserDelete(user))
    }

    pub fn child_update(child: Child) -> Self {
        Self::new(EventPayload::ChildUpdate(child))
    }

    pub fn family_update(family: Family) -> Self {
        Self::new(EventPayload::FamilyUpdate(family))
    }

    pub fn educator_update(educator: Educator) -> Self {
        Self::new(EventPayload::EducatorUpdate(educator))
    }

    pub fn health_professional_update(health_professional: HealthProfessional) -> Self {
        Self::new(EventPayload::HealthProfessionalUpdate(health_professional))
    }

    pub fn application_update(application: Application) -> Self {
        Self::new(EventPayload::ApplicationUpdate(application))
    }

    pub fn institution_delete(institution: Institution) -> Self {
        Self::new(EventPayload::InstitutionDelete(institution))
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn event_name(&self) -> &'static str {
        self.kind().event_name()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// 序列化为线上格式：`{ event_name, timestamp, <payload_field>: {...} }`
    pub fn to_json(&self) -> RelayResult<Value> {
        let mut doc = Map::new();
        doc.insert(
            EVENT_NAME_FIELD.to_string(),
            Value::String(self.event_name().to_string()),
        );
        doc.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        doc.insert(
            self.kind().payload_field().to_string(),
            self.payload.to_json()?,
        );
        Ok(Value::Object(doc))
    }

    pub fn to_bytes(&self) -> RelayResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json()?)?)
    }

    /// 从 JSON 重建事件，未知/损坏的事件以显式变体返回
    pub fn reconstruct(value: &Value) -> Reconstruction {
        Reconstruction::from_json(value)
    }

    /// 严格重建：未知或损坏的事件返回错误
    pub fn from_json(value: &Value) -> RelayResult<Self> {
        Self::reconstruct(value).into_event()
    }

    pub fn from_slice(bytes: &[u8]) -> RelayResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json(&value)
    }
}

impl TryFrom<&Value> for IntegrationEvent {
    type Error = RelayError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        IntegrationEvent::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn serializes_to_wire_shape() {
        let ts = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        let event = IntegrationEvent::with_timestamp(
            EventPayload::ApplicationUpdate(Application {
                account: User::builder()
                    .id("a-1".to_string())
                    .username("tablet-app".to_string())
                    .build(),
                application_name: Some("Tablet".into()),
            }),
            ts,
        );

        let doc = event.to_json().unwrap();
        assert_eq!(
            doc,
            json!({
                "event_name": "ApplicationUpdateEvent",
                "timestamp": "2021-03-01T12:00:00.000Z",
                "application": {
                    "id": "a-1",
                    "username": "tablet-app",
                    "application_name": "Tablet",
                },
            })
        );
    }

    #[test]
    fn json_reconstructs_same_event() {
        let event = IntegrationEvent::institution_delete(
            Institution::builder()
                .id("i-9".to_string())
                .name("Escola".to_string())
                .build(),
        );
        let bytes = event.to_bytes().unwrap();
        let back = IntegrationEvent::from_slice(&bytes).unwrap();

        assert_eq!(back.kind(), EventKind::InstitutionDelete);
        assert_eq!(back.payload(), event.payload());
        assert_eq!(back.payload().subject_id(), Some("i-9"));
        // 毫秒精度
        assert_eq!(
            back.timestamp().timestamp_millis(),
            event.timestamp().timestamp_millis()
        );
    }

    #[test]
    fn strict_reconstruction_reports_unknown_kind() {
        let err = IntegrationEvent::from_json(&json!({
            "event_name": "WeightSaveEvent",
            "timestamp": "2021-03-01T12:00:00.000Z",
        }))
        .unwrap_err();
        match err {
            RelayError::UnknownEventKind { event_name } => {
                assert_eq!(event_name, "WeightSaveEvent")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
