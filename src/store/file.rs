//! JSON-file datastore.
//!
//! The whole dataset lives in memory and is rewritten to disk on every save.
//! Writes go to a sibling temp file first and are renamed into place.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Classroom, Student};
use crate::store::memory::StoreData;
use crate::store::Datastore;

pub struct FileStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let data = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                Error::Persistence(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let data: StoreData = serde_json::from_str(&content).map_err(|e| {
                Error::Persistence(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            info!(
                "Loaded {} students and {} classrooms from {}",
                data.students.len(),
                data.classrooms.len(),
                path.display()
            );
            data
        } else {
            debug!("No data file at {}, starting empty", path.display());
            StoreData::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, data: &StoreData) -> Result<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| Error::Persistence(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Persistence(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::Persistence(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::Persistence(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl Datastore for FileStore {
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.data.read().await.students.get(&id).cloned())
    }

    async fn find_students(&self, ids: &[Uuid]) -> Result<Vec<Student>> {
        let data = self.data.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| data.students.get(id).cloned())
            .collect())
    }

    async fn students_for_teacher(&self, teacher_id: &str) -> Result<Vec<Student>> {
        Ok(self.data.read().await.students_for_teacher(teacher_id))
    }

    async fn save_student(&self, student: &Student) -> Result<()> {
        let mut data = self.data.write().await;
        let previous = data.students.insert(student.id, student.clone());

        if let Err(e) = self.flush(&data).await {
            match previous {
                Some(prev) => data.students.insert(student.id, prev),
                None => data.students.remove(&student.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_student(&self, id: Uuid) -> Result<Option<Student>> {
        let mut data = self.data.write().await;
        let before = data.clone();
        let removed = data.remove_student(id);

        if removed.is_some() {
            if let Err(e) = self.flush(&data).await {
                *data = before;
                return Err(e);
            }
        }
        Ok(removed)
    }

    async fn find_classroom(&self, id: Uuid) -> Result<Option<Classroom>> {
        Ok(self.data.read().await.classrooms.get(&id).cloned())
    }

    async fn save_classroom(&self, classroom: &Classroom) -> Result<()> {
        let mut data = self.data.write().await;
        let previous = data.classrooms.insert(classroom.id, classroom.clone());

        if let Err(e) = self.flush(&data).await {
            match previous {
                Some(prev) => data.classrooms.insert(classroom.id, prev),
                None => data.classrooms.remove(&classroom.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn classrooms_for_teacher(&self, teacher_id: &str) -> Result<Vec<Classroom>> {
        Ok(self.data.read().await.classrooms_for_teacher(teacher_id))
    }

    async fn delete_classroom(&self, id: Uuid) -> Result<Option<Classroom>> {
        let mut data = self.data.write().await;
        let before = data.clone();
        let removed = data.remove_classroom(id);

        if removed.is_some() {
            if let Err(e) = self.flush(&data).await {
                *data = before;
                return Err(e);
            }
        }
        Ok(removed)
    }
}
