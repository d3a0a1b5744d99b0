//! Datastore boundary for student and classroom records.
//!
//! The pipeline only needs single-document reads and writes; each call is
//! assumed atomic for one record. There is no optimistic concurrency check,
//! so concurrent writers to the same student race and the last save wins.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Classroom, Student};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage operations on student and classroom records.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>>;

    /// Fetch every existing student among `ids`, in `ids` order. Unknown ids are omitted.
    async fn find_students(&self, ids: &[Uuid]) -> Result<Vec<Student>>;

    /// Students owned by `teacher_id`, oldest first.
    async fn students_for_teacher(&self, teacher_id: &str) -> Result<Vec<Student>>;

    /// Insert or replace.
    async fn save_student(&self, student: &Student) -> Result<()>;

    /// Remove a student and drop it from every classroom roster.
    async fn delete_student(&self, id: Uuid) -> Result<Option<Student>>;

    async fn find_classroom(&self, id: Uuid) -> Result<Option<Classroom>>;

    /// Insert or replace.
    async fn save_classroom(&self, classroom: &Classroom) -> Result<()>;

    /// Classrooms owned by `teacher_id`, oldest first.
    async fn classrooms_for_teacher(&self, teacher_id: &str) -> Result<Vec<Classroom>>;

    /// Remove a classroom and drop its id from every student's `classroom_ids`.
    async fn delete_classroom(&self, id: Uuid) -> Result<Option<Classroom>>;
}
