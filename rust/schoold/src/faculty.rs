use crate::db;
use crate::roster::{new_id, required, RosterError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacultyId(String);

impl FacultyId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyMember {
    pub id: FacultyId,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub qualification: String,
    #[serde(default)]
    pub experience: String,
    /// Emoji or short text shown next to the name.
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub qualification: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub avatar: String,
}

impl FacultyDraft {
    fn build(self, id: FacultyId) -> Result<FacultyMember, RosterError> {
        Ok(FacultyMember {
            id,
            name: required("name", &self.name)?,
            role: required("role", &self.role)?,
            qualification: self.qualification.trim().to_string(),
            experience: self.experience.trim().to_string(),
            avatar: self.avatar.trim().to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct FacultyRoster {
    members: Vec<FacultyMember>,
}

impl FacultyRoster {
    pub fn open(conn: &Connection) -> anyhow::Result<Self> {
        let members: Vec<FacultyMember> = db::snapshot_load(conn, db::FACULTY_KEY)?;
        tracing::debug!(count = members.len(), "loaded faculty snapshot");
        Ok(Self { members })
    }

    pub(crate) fn with_members(members: Vec<FacultyMember>) -> Self {
        Self { members }
    }

    pub fn all(&self) -> &[FacultyMember] {
        &self.members
    }

    pub fn find(&self, id: &FacultyId) -> Option<&FacultyMember> {
        self.members.iter().find(|m| m.id == *id)
    }

    pub fn create(&mut self, conn: &Connection, draft: FacultyDraft) -> Result<&FacultyMember, RosterError> {
        let member = draft.build(FacultyId::new(&new_id()))?;
        self.members.push(member);
        if let Err(e) = self.persist(conn) {
            self.members.pop();
            return Err(e.into());
        }
        let created = &self.members[self.members.len() - 1];
        tracing::info!(faculty_id = created.id.as_str(), "faculty created");
        Ok(created)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        id: &FacultyId,
        draft: FacultyDraft,
    ) -> Result<&FacultyMember, RosterError> {
        let Some(idx) = self.members.iter().position(|m| m.id == *id) else {
            return Err(RosterError::NotFound("faculty member"));
        };
        let member = draft.build(id.clone())?;
        let previous = std::mem::replace(&mut self.members[idx], member);
        if let Err(e) = self.persist(conn) {
            self.members[idx] = previous;
            return Err(e.into());
        }
        tracing::info!(faculty_id = id.as_str(), "faculty updated");
        Ok(&self.members[idx])
    }

    pub fn delete(&mut self, conn: &Connection, id: &FacultyId) -> Result<FacultyMember, RosterError> {
        let Some(idx) = self.members.iter().position(|m| m.id == *id) else {
            return Err(RosterError::NotFound("faculty member"));
        };
        let removed = self.members.remove(idx);
        if let Err(e) = self.persist(conn) {
            self.members.insert(idx, removed);
            return Err(e.into());
        }
        tracing::info!(faculty_id = id.as_str(), "faculty deleted");
        Ok(removed)
    }

    fn persist(&self, conn: &Connection) -> anyhow::Result<()> {
        db::snapshot_save(conn, db::FACULTY_KEY, &self.members)
    }
}
