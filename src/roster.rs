//! Classroom and student records owned by one teacher.
//!
//! Every lookup is scoped to the teacher: a record owned by someone else is
//! reported as not found.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Classroom, Student};
use crate::store::Datastore;

/// Fields for a new student.
#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub name: String,
    pub ell: bool,
    pub gender: Option<String>,
    pub dob: Option<DateTime<Utc>>,
    /// Roster to enrol the student in.
    pub classroom_id: Option<Uuid>,
}

/// Changes to an existing student. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub ell: Option<bool>,
    pub gender: Option<String>,
    /// `Some(None)` clears the date of birth.
    pub dob: Option<Option<DateTime<Utc>>>,
    /// Move the student to this classroom only.
    pub classroom_id: Option<Uuid>,
}

pub struct Roster {
    store: Arc<dyn Datastore>,
    teacher_id: String,
}

impl Roster {
    pub fn new(store: Arc<dyn Datastore>, teacher_id: impl Into<String>) -> Self {
        Self {
            store,
            teacher_id: teacher_id.into(),
        }
    }

    pub async fn create_classroom(
        &self,
        name: &str,
        grade_level: &str,
        subject: &str,
    ) -> Result<Classroom> {
        if name.trim().is_empty() {
            return Err(Error::Validation("classroom name is required".to_string()));
        }

        let mut classroom = Classroom::new(self.teacher_id.clone(), name.trim());
        classroom.grade_level = grade_level.to_string();
        classroom.subject = subject.to_string();
        self.store.save_classroom(&classroom).await?;

        info!("Created classroom {} ({})", classroom.name, classroom.id);
        Ok(classroom)
    }

    pub async fn find_classroom(&self, id: Uuid) -> Result<Classroom> {
        self.store
            .find_classroom(id)
            .await?
            .filter(|c| c.teacher_id == self.teacher_id)
            .ok_or_else(|| Error::classroom_not_found(id))
    }

    /// This teacher's classrooms, oldest first.
    pub async fn list_classrooms(&self) -> Result<Vec<Classroom>> {
        self.store.classrooms_for_teacher(&self.teacher_id).await
    }

    /// Delete a classroom. Its students stay, minus the enrolment.
    pub async fn delete_classroom(&self, id: Uuid) -> Result<Classroom> {
        self.find_classroom(id).await?;
        let removed = self
            .store
            .delete_classroom(id)
            .await?
            .ok_or_else(|| Error::classroom_not_found(id))?;

        info!("Deleted classroom {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// Create a student, enrolling it in `classroom_id` when given.
    ///
    /// The classroom is checked before anything is written.
    pub async fn create_student(&self, new: NewStudent) -> Result<Student> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("student name is required".to_string()));
        }

        let classroom = match new.classroom_id {
            Some(id) => Some(self.find_classroom(id).await?),
            None => None,
        };

        let mut student = Student::new(self.teacher_id.clone(), new.name.trim());
        student.ell = new.ell;
        student.gender = new.gender;
        student.dob = new.dob;
        if let Some(ref c) = classroom {
            student.classroom_ids.push(c.id);
        }
        self.store.save_student(&student).await?;

        if let Some(mut classroom) = classroom {
            classroom.students.push(student.id);
            self.store.save_classroom(&classroom).await?;
        }

        info!("Created student {} ({})", student.name, student.id);
        Ok(student)
    }

    pub async fn find_student(&self, id: Uuid) -> Result<Student> {
        self.store
            .find_student(id)
            .await?
            .filter(|s| s.teacher_id == self.teacher_id)
            .ok_or_else(|| Error::student_not_found(id))
    }

    /// All of this teacher's students, oldest first.
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        self.store.students_for_teacher(&self.teacher_id).await
    }

    /// Apply `patch` to a student.
    ///
    /// A new classroom replaces every previous enrolment, and the rosters on
    /// both sides are updated to match.
    pub async fn update_student(&self, id: Uuid, patch: StudentPatch) -> Result<Student> {
        let mut student = self.find_student(id).await?;

        if let Some(ref name) = patch.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("student name is required".to_string()));
            }
        }
        let target = match patch.classroom_id {
            Some(cid) => Some(self.find_classroom(cid).await?),
            None => None,
        };

        if let Some(name) = patch.name {
            student.name = name.trim().to_string();
        }
        if let Some(ell) = patch.ell {
            student.ell = ell;
        }
        if let Some(gender) = patch.gender {
            student.gender = Some(gender).filter(|g| !g.is_empty());
        }
        if let Some(dob) = patch.dob {
            student.dob = dob;
        }

        let previous = match target {
            Some(ref classroom) => std::mem::replace(&mut student.classroom_ids, vec![classroom.id]),
            None => Vec::new(),
        };
        self.store.save_student(&student).await?;

        if let Some(mut classroom) = target {
            for old_id in previous.into_iter().filter(|c| *c != classroom.id) {
                if let Some(mut old) = self.store.find_classroom(old_id).await? {
                    old.students.retain(|s| *s != student.id);
                    self.store.save_classroom(&old).await?;
                }
            }
            if !classroom.students.contains(&student.id) {
                classroom.students.push(student.id);
                self.store.save_classroom(&classroom).await?;
            }
        }

        info!("Updated student {} ({})", student.name, student.id);
        Ok(student)
    }

    /// Delete a student and drop it from every roster.
    pub async fn delete_student(&self, id: Uuid) -> Result<Student> {
        self.find_student(id).await?;
        let removed = self
            .store
            .delete_student(id)
            .await?
            .ok_or_else(|| Error::student_not_found(id))?;

        info!("Deleted student {} ({})", removed.name, removed.id);
        Ok(removed)
    }
}
