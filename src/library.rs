use crate::store::schema::SavedProblem;

/// Saved problems, newest first. Order is insertion order only; favorites
/// are not floated to the top.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemLibrary {
    problems: Vec<SavedProblem>,
}

impl ProblemLibrary {
    pub fn new(problems: Vec<SavedProblem>) -> Self {
        Self { problems }
    }

    pub fn add(&mut self, problem: SavedProblem) {
        self.problems.insert(0, problem);
    }

    /// Returns false when no entry has `id`.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.problems.len();
        self.problems.retain(|p| p.id != id);
        self.problems.len() != before
    }

    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        match self.problems.iter_mut().find(|p| p.id == id) {
            Some(problem) => {
                problem.is_favorite = !problem.is_favorite;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&SavedProblem> {
        self.problems.iter().find(|p| p.id == id)
    }

    pub fn problems(&self) -> &[SavedProblem] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Split user tag entry on ASCII and full-width commas, trimming and
/// dropping empties and repeats.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split([',', '，']).map(str::trim) {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
