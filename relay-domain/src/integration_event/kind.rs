use std::fmt;

/// 已知事件种类（封闭集合，与线上格式保持兼容）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserDelete,
    ChildUpdate,
    FamilyUpdate,
    EducatorUpdate,
    HealthProfessionalUpdate,
    ApplicationUpdate,
    InstitutionDelete,
}

impl EventKind {
    const ALL: [EventKind; 7] = [
        EventKind::UserDelete,
        EventKind::ChildUpdate,
        EventKind::FamilyUpdate,
        EventKind::EducatorUpdate,
        EventKind::HealthProfessionalUpdate,
        EventKind::ApplicationUpdate,
        EventKind::InstitutionDelete,
    ];

    pub fn all() -> &'static [EventKind] {
        &Self::ALL
    }

    /// 判别值（`event_name`）
    pub const fn event_name(self) -> &'static str {
        match self {
            EventKind::UserDelete => "UserDeleteEvent",
            EventKind::ChildUpdate => "ChildUpdateEvent",
            EventKind::FamilyUpdate => "FamilyUpdateEvent",
            EventKind::EducatorUpdate => "EducatorUpdateEvent",
            EventKind::HealthProfessionalUpdate => "HealthProfessionalUpdateEvent",
            EventKind::ApplicationUpdate => "ApplicationUpdateEvent",
            EventKind::InstitutionDelete => "InstitutionDeleteEvent",
        }
    }

    /// 承载领域快照的字段名
    pub const fn payload_field(self) -> &'static str {
        match self {
            EventKind::UserDelete => "user",
            EventKind::ChildUpdate => "child",
            EventKind::FamilyUpdate => "family",
            EventKind::EducatorUpdate => "educator",
            EventKind::HealthProfessionalUpdate => "healthprofessional",
            EventKind::ApplicationUpdate => "application",
            EventKind::InstitutionDelete => "institution",
        }
    }

    /// 默认路由键
    pub const fn default_routing_key(self) -> &'static str {
        match self {
            EventKind::UserDelete => "users.delete",
            EventKind::ChildUpdate => "children.update",
            EventKind::FamilyUpdate => "families.update",
            EventKind::EducatorUpdate => "educators.update",
            EventKind::HealthProfessionalUpdate => "healthprofessionals.update",
            EventKind::ApplicationUpdate => "applications.update",
            EventKind::InstitutionDelete => "institutions.delete",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.event_name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}
