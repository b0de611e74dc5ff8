use crate::errors::RequestError;

/// Where the engine writes generated stories unless told otherwise.
pub const DEFAULT_STORIES_PATH: &str = "public/stories";
pub const MAX_PAGES: u32 = 10;

/// Body of a story submission.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoryRequest {
    /// Writing prompt.
    pub story: String,
    /// Number of pages to generate, `1..=MAX_PAGES`.
    pub pages: u32,
    /// Output directory handed to the engine.
    pub path: String,
}

impl StoryRequest {
    pub fn new(story: impl Into<String>, pages: u32) -> Self {
        Self {
            story: story.into(),
            pages,
            path: DEFAULT_STORIES_PATH.to_string(),
        }
    }

    /// Overrides the output directory.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.story.trim().is_empty() {
            return Err(RequestError::validation("story must not be empty"));
        }
        if !(1..=MAX_PAGES).contains(&self.pages) {
            return Err(RequestError::validation(format!(
                "pages must be between 1 and {MAX_PAGES}, got {}",
                self.pages
            )));
        }
        if self.path.trim().is_empty() {
            return Err(RequestError::validation("path must not be empty"));
        }
        Ok(())
    }

    /// Input string handed to the story script.
    pub fn engine_input(&self) -> String {
        format!(
            "--story {} --pages {} --path {}",
            self.story, self.pages, self.path
        )
    }
}
