//! In-memory datastore.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Classroom, Student};
use crate::store::Datastore;

/// Every record the store holds. Also the on-disk shape used by [`crate::store::FileStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub students: BTreeMap<Uuid, Student>,
    #[serde(default)]
    pub classrooms: BTreeMap<Uuid, Classroom>,
}

impl StoreData {
    pub(crate) fn remove_student(&mut self, id: Uuid) -> Option<Student> {
        let removed = self.students.remove(&id)?;
        for classroom in self.classrooms.values_mut() {
            classroom.students.retain(|s| *s != id);
        }
        Some(removed)
    }

    pub(crate) fn remove_classroom(&mut self, id: Uuid) -> Option<Classroom> {
        let removed = self.classrooms.remove(&id)?;
        for student in self.students.values_mut() {
            student.classroom_ids.retain(|c| *c != id);
        }
        Some(removed)
    }

    pub(crate) fn classrooms_for_teacher(&self, teacher_id: &str) -> Vec<Classroom> {
        let mut classrooms: Vec<Classroom> = self
            .classrooms
            .values()
            .filter(|c| c.teacher_id == teacher_id)
            .cloned()
            .collect();
        classrooms.sort_by_key(|c| c.created_at);
        classrooms
    }

    pub(crate) fn students_for_teacher(&self, teacher_id: &str) -> Vec<Student> {
        let mut students: Vec<Student> = self
            .students
            .values()
            .filter(|s| s.teacher_id == teacher_id)
            .cloned()
            .collect();
        students.sort_by_key(|s| s.created_at);
        students
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of everything currently stored.
    pub async fn snapshot(&self) -> StoreData {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
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
        self.data
            .write()
            .await
            .students
            .insert(student.id, student.clone());
        Ok(())
    }

    async fn delete_student(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.data.write().await.remove_student(id))
    }

    async fn find_classroom(&self, id: Uuid) -> Result<Option<Classroom>> {
        Ok(self.data.read().await.classrooms.get(&id).cloned())
    }

    async fn save_classroom(&self, classroom: &Classroom) -> Result<()> {
        self.data
            .write()
            .await
            .classrooms
            .insert(classroom.id, classroom.clone());
        Ok(())
    }

    async fn classrooms_for_teacher(&self, teacher_id: &str) -> Result<Vec<Classroom>> {
        Ok(self.data.read().await.classrooms_for_teacher(teacher_id))
    }

    async fn delete_classroom(&self, id: Uuid) -> Result<Option<Classroom>> {
        Ok(self.data.write().await.remove_classroom(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_find_student() {
        let store = MemoryStore::new();
        let student = Student::new("t-1", "Avery Lee");
        store.save_student(&student).await.unwrap();

        let found = store.find_student(student.id).await.unwrap();
        assert_eq!(found, Some(student));
        assert!(store.find_student(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_students_skips_unknown_ids() {
        let store = MemoryStore::new();
        let a = Student::new("t-1", "A");
        let b = Student::new("t-1", "B");
        store.save_student(&a).await.unwrap();
        store.save_student(&b).await.unwrap();

        let found = store
            .find_students(&[b.id, Uuid::new_v4(), a.id])
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_delete_student_leaves_rosters() {
        let store = MemoryStore::new();
        let student = Student::new("t-1", "Avery Lee");
        let mut classroom = Classroom::new("t-1", "Period 3 Math");
        classroom.students.push(student.id);
        store.save_student(&student).await.unwrap();
        store.save_classroom(&classroom).await.unwrap();

        let removed = store.delete_student(student.id).await.unwrap();
        assert!(removed.is_some());

        let classroom = store.find_classroom(classroom.id).await.unwrap().unwrap();
        assert!(classroom.students.is_empty());
        assert!(store.delete_student(student.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_classroom_unlinks_students() {
        let store = MemoryStore::new();
        let classroom = Classroom::new("t-1", "Period 3 Math");
        let other = Classroom::new("t-1", "Period 5 Science");
        let mut student = Student::new("t-1", "Avery Lee");
        student.classroom_ids = vec![classroom.id, other.id];
        store.save_student(&student).await.unwrap();
        store.save_classroom(&classroom).await.unwrap();
        store.save_classroom(&other).await.unwrap();

        let removed = store.delete_classroom(classroom.id).await.unwrap();
        assert_eq!(removed.map(|c| c.id), Some(classroom.id));

        let stored = store.find_student(student.id).await.unwrap().unwrap();
        assert_eq!(stored.classroom_ids, vec![other.id]);
        let remaining = store.classrooms_for_teacher("t-1").await.unwrap();
        assert_eq!(remaining, vec![other]);
        assert!(store.delete_classroom(classroom.id).await.unwrap().is_none());
    }

    #[test]
    fn test_students_for_teacher_filters_owner() {
        let mut data = StoreData::default();
        let mine = Student::new("t-1", "Mine");
        let theirs = Student::new("t-2", "Theirs");
        data.students.insert(mine.id, mine.clone());
        data.students.insert(theirs.id, theirs);

        let store = MemoryStore::with_data(data);
        let found = tokio_test::block_on(store.students_for_teacher("t-1")).unwrap();
        assert_eq!(found, vec![mine]);
    }
}
