//! Course catalog loaded from markdown files.
//!
//! Courses live in `{content_dir}/courses/*.md`: YAML front matter for the
//! metadata, markdown for the syllabus body. Everything is read once at
//! startup and rendered to HTML; a file that fails to parse is logged and
//! skipped so one bad course cannot take the site down.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use numisma_core::Price;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Course difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// One lesson in a course outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Front matter of a course file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMeta {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub level: CourseLevel,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    /// Zero for free courses.
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Position in the catalog; lower first.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub draft: bool,
}

/// A rendered course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub slug: String,
    #[serde(flatten)]
    pub meta: CourseMeta,
    pub content_html: String,
}

impl Course {
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.meta.price.amount() == 0
    }

    /// Catalog route for this course.
    #[must_use]
    pub fn route(&self) -> String {
        format!("/courses/{}", self.slug)
    }
}

/// Catalog summary of a course (no body).
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub level: CourseLevel,
    pub duration: Option<&'a str>,
    pub instructor: Option<&'a str>,
    pub price: Price,
    pub lesson_count: usize,
    pub tags: &'a [String],
    pub image: Option<&'a str>,
}

impl<'a> From<&'a Course> for CourseSummary<'a> {
    fn from(course: &'a Course) -> Self {
        Self {
            slug: &course.slug,
            title: &course.meta.title,
            description: &course.meta.description,
            level: course.meta.level,
            duration: course.meta.duration.as_deref(),
            instructor: course.meta.instructor.as_deref(),
            price: course.meta.price,
            lesson_count: course.meta.lessons.len(),
            tags: &course.meta.tags,
            image: course.meta.image.as_deref(),
        }
    }
}

/// All published courses, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct CourseCatalog {
    courses: Arc<Vec<Course>>,
    by_slug: Arc<HashMap<String, usize>>,
}

impl CourseCatalog {
    /// Load every course under `{content_dir}/courses`.
    ///
    /// A missing directory yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let dir = content_dir.join("courses");
        if !dir.exists() {
            tracing::warn!("Courses directory does not exist: {:?}", dir);
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ContentError::Io(e.to_string()))?;
        let mut courses = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match load_course(&path) {
                    Ok(course) if course.meta.draft => {
                        tracing::debug!("Skipping draft course: {}", course.slug);
                    }
                    Ok(course) => {
                        tracing::info!("Loaded course: {}", course.slug);
                        courses.push(course);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load course {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::from_courses(courses))
    }

    /// Build a catalog from already-parsed courses.
    #[must_use]
    pub fn from_courses(mut courses: Vec<Course>) -> Self {
        courses.sort_by(|a, b| a.meta.order.cmp(&b.meta.order).then(a.slug.cmp(&b.slug)));
        let by_slug = courses
            .iter()
            .enumerate()
            .map(|(i, c)| (c.slug.clone(), i))
            .collect();
        Self {
            courses: Arc::new(courses),
            by_slug: Arc::new(by_slug),
        }
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&Course> {
        self.by_slug.get(slug).and_then(|&i| self.courses.get(i))
    }

    pub fn all(&self) -> impl Iterator<Item = &Course> {
        self.courses.iter()
    }

    /// Courses at a level, or all when `level` is `None`.
    pub fn by_level(&self, level: Option<CourseLevel>) -> impl Iterator<Item = &Course> {
        self.courses
            .iter()
            .filter(move |c| level.is_none_or(|l| c.meta.level == l))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

/// Parse one course file. The slug is the file stem.
fn load_course(path: &Path) -> Result<Course, ContentError> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;

    let slug = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?
        .to_string();

    parse_course(slug, &content)
}

/// Parse a course from its slug and file text.
///
/// # Errors
///
/// Returns `ContentError::Parse` when the front matter is missing or invalid.
pub fn parse_course(slug: String, content: &str) -> Result<Course, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<CourseMeta> = matter
        .parse(content)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    Ok(Course {
        slug,
        meta,
        content_html: render_markdown(&parsed.content),
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(content, &options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---
title: Ancient Coin Authentication
description: Spot cast copies and tooled fakes.
level: advanced
price: 1499
order: 2
lessons:
  - title: Weight and die axis
    duration: 20 min
  - title: Casting bubbles
tags: [authentication, ancient]
---

## What you will learn

* Weighing on a **carat scale**
";

    #[test]
    fn test_parse_course() {
        let course = parse_course("ancient-coin-authentication".into(), SAMPLE).unwrap();
        assert_eq!(course.meta.title, "Ancient Coin Authentication");
        assert_eq!(course.meta.level, CourseLevel::Advanced);
        assert_eq!(course.meta.price, Price::new(1499));
        assert_eq!(course.meta.lessons.len(), 2);
        assert!(course.content_html.contains("<strong>carat scale</strong>"));
        assert!(!course.is_free());
        assert_eq!(course.route(), "/courses/ancient-coin-authentication");
    }

    #[test]
    fn test_missing_front_matter() {
        assert!(parse_course("x".into(), "# Just a heading").is_err());
    }

    #[test]
    fn test_catalog_order_and_lookup() {
        let mut first = parse_course("b".into(), SAMPLE).unwrap();
        first.meta.order = 1;
        let second = parse_course("a".into(), SAMPLE).unwrap();
        let catalog = CourseCatalog::from_courses(vec![second, first]);

        let slugs: Vec<&str> = catalog.all().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a"]);
        assert!(catalog.get("a").is_some());
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.by_level(Some(CourseLevel::Beginner)).count(), 0);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let catalog = CourseCatalog::load(Path::new("/nonexistent/content")).unwrap();
        assert!(catalog.is_empty());
    }
}
