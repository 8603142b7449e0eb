use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::MAX_NAME_LEN;
use crate::model::{Facility, FacilityStatus};
use crate::policy::FacilityPolicy;

/// A member as the directory knows it: an id plus the facilities they subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Ulid,
    #[serde(default)]
    pub subscriptions: Vec<Ulid>,
}

/// In-process stand-in for the facility and member directories.
#[derive(Default)]
pub struct InMemoryDirectory {
    facilities: DashMap<Ulid, Facility>,
    members: DashMap<Ulid, Member>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a facility after validating its name and policy.
    pub fn upsert_facility(&self, facility: Facility) -> Result<(), EngineError> {
        if facility.name.len() > MAX_NAME_LEN {
            return Err(EngineError::InvalidArgument("facility name too long".into()));
        }
        facility.policy.validate()?;
        self.facilities.insert(facility.id, facility);
        Ok(())
    }

    pub fn update_policy(&self, id: Ulid, policy: FacilityPolicy) -> Result<Facility, EngineError> {
        policy.validate()?;
        let mut entry = self
            .facilities
            .get_mut(&id)
            .ok_or(EngineError::facility_not_found(id))?;
        entry.policy = policy;
        Ok(entry.clone())
    }

    pub fn set_status(&self, id: Ulid, status: FacilityStatus) -> Result<Facility, EngineError> {
        let mut entry = self
            .facilities
            .get_mut(&id)
            .ok_or(EngineError::facility_not_found(id))?;
        entry.status = status;
        Ok(entry.clone())
    }

    pub fn facilities(&self) -> Vec<Facility> {
        let mut all: Vec<Facility> = self.facilities.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|f| f.id);
        all
    }

    pub fn add_member(&self, member: Member) {
        self.members.insert(member.id, member);
    }

    pub fn remove_member(&self, id: &Ulid) -> Option<Member> {
        self.members.remove(id).map(|(_, m)| m)
    }
}

#[async_trait]
impl super::FacilityDirectory for InMemoryDirectory {
    async fn get_facility(&self, id: Ulid) -> Result<Option<Facility>, EngineError> {
        Ok(self.facilities.get(&id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl super::MemberDirectory for InMemoryDirectory {
    async fn member_exists(&self, member_id: Ulid) -> Result<bool, EngineError> {
        Ok(self.members.contains_key(&member_id))
    }

    async fn has_active_subscription(&self, member_id: Ulid, facility_id: Ulid) -> Result<bool, EngineError> {
        Ok(self
            .members
            .get(&member_id)
            .is_some_and(|m| m.subscriptions.contains(&facility_id)))
    }
}
