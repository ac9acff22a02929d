//! Courses and the catalog that answers "how long does this training last".

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// A training course. Only the validity period matters to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
  pub course_id:       Uuid,
  pub name:            String,
  /// Months a completion stays valid. `None` marks a one-off course that
  /// never lapses.
  pub validity_months: Option<u32>,
}

impl Course {
  pub fn is_one_off(&self) -> bool { self.validity_months.is_none() }
}

/// Read-only lookup of courses. Catalog administration lives elsewhere.
pub trait CourseCatalog: Send + Sync {
  type Error: Into<Error> + std::error::Error + Send + Sync + 'static;

  /// Retrieve a course by UUID. Returns `None` if not found.
  fn get_course(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  /// The validity period of a course; fails with
  /// [`Error::CourseNotFound`] if the course is unknown.
  fn get_validity_months(
    &self,
    course_id: Uuid,
  ) -> impl Future<Output = Result<Option<u32>>> + Send + '_ {
    async move {
      let course = self
        .get_course(course_id)
        .await
        .map_err(Into::<Error>::into)?
        .ok_or(Error::CourseNotFound(course_id))?;
      Ok(course.validity_months)
    }
  }
}
