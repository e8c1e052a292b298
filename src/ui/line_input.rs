use crossterm::event::{KeyCode, KeyEvent};

use crate::ui::text_area::{InputResult, TextArea};

const SCAN_LIMIT: usize = 1000;
const CANDIDATE_LIMIT: usize = 100;

/// Single-line prompt. When built with [`LineInput::path`], Tab cycles
/// through file-system completions for the text before the cursor.
pub struct LineInput {
    area: TextArea,
    complete_paths: bool,
    completions: Vec<String>,
    completion_index: Option<usize>,
    /// True if the last directory scan failed.
    pub completion_error: bool,
}

impl LineInput {
    pub fn new(text: &str) -> Self {
        Self {
            area: TextArea::new(text),
            complete_paths: false,
            completions: Vec::new(),
            completion_index: None,
            completion_error: false,
        }
    }

    pub fn path(text: &str) -> Self {
        Self {
            complete_paths: true,
            ..Self::new(text)
        }
    }

    pub fn value(&self) -> &str {
        self.area.value()
    }

    pub fn area(&self) -> &TextArea {
        &self.area
    }

    pub fn handle(&mut self, key: KeyEvent) -> InputResult {
        match key.code {
            KeyCode::Tab if self.complete_paths => {
                self.tab_complete(true);
                InputResult::Continue
            }
            KeyCode::BackTab if self.complete_paths => {
                self.tab_complete(false);
                InputResult::Continue
            }
            _ => {
                self.reset_completion();
                self.area.handle(key)
            }
        }
    }

    fn reset_completion(&mut self) {
        self.completions.clear();
        self.completion_index = None;
        self.completion_error = false;
    }

    fn tab_complete(&mut self, forward: bool) {
        if self.area.cursor() < self.area.value().chars().count() {
            return;
        }

        match self.completion_index {
            None => {
                let seed = self.area.value().to_string();
                self.completion_error = false;
                self.completions = self.build_completions(&seed);
                if !self.completions.is_empty() {
                    self.select_completion(0);
                }
            }
            Some(idx) => {
                let count = self.completions.len();
                let next = if forward {
                    (idx + 1) % count
                } else {
                    (idx + count - 1) % count
                };
                self.select_completion(next);
            }
        }
    }

    fn select_completion(&mut self, idx: usize) {
        self.completion_index = Some(idx);
        self.area.set_value(&self.completions[idx]);
    }

    fn build_completions(&mut self, seed: &str) -> Vec<String> {
        // Either separator may be typed on any platform.
        let split_at = seed.rfind(['/', '\\']);
        let (dir_str, partial) = match split_at {
            Some(pos) => (&seed[..=pos], &seed[pos + 1..]),
            None => ("", seed),
        };

        let scan_dir = if dir_str.is_empty() {
            std::path::PathBuf::from(".")
        } else {
            crate::image::expand_home(dir_str)
        };

        let entries = match std::fs::read_dir(&scan_dir) {
            Ok(rd) => rd.map(|result| {
                result.map(|entry| {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
                    (name, is_dir)
                })
            }),
            Err(_) => {
                self.completion_error = true;
                return Vec::new();
            }
        };

        self.collect_completions(entries, dir_str, partial)
    }

    /// Filter and order `(name, is_dir)` entries: directories first, then
    /// files the image loader accepts, alphabetical within each group.
    fn collect_completions(
        &mut self,
        entries: impl Iterator<Item = std::io::Result<(String, bool)>>,
        dir_str: &str,
        partial: &str,
    ) -> Vec<String> {
        let sep = std::path::MAIN_SEPARATOR;
        let include_hidden = partial.starts_with('.');

        let mut candidates: Vec<(bool, String)> = Vec::new();
        for entry in entries.take(SCAN_LIMIT) {
            let Ok((name, is_dir)) = entry else {
                self.completion_error = true;
                return Vec::new();
            };
            if (!include_hidden && name.starts_with('.')) || !name.starts_with(partial) {
                continue;
            }
            if !is_dir && crate::image::mime_for_path(std::path::Path::new(&name)).is_none() {
                continue;
            }
            let full = if is_dir {
                format!("{dir_str}{name}{sep}")
            } else {
                format!("{dir_str}{name}")
            };
            candidates.push((is_dir, full));
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        candidates.truncate(CANDIDATE_LIMIT);
        candidates.into_iter().map(|(_, path)| path).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn plain_prompt_ignores_tab() {
        let mut input = LineInput::new("语法");
        assert_eq!(input.handle(key(KeyCode::Tab)), InputResult::Continue);
        assert_eq!(input.value(), "语法");
        assert_eq!(input.handle(key(KeyCode::Enter)), InputResult::Submit);
        assert_eq!(input.handle(key(KeyCode::Esc)), InputResult::Cancel);
    }

    #[test]
    fn tab_at_midline_is_noop() {
        let mut input = LineInput::path("hello");
        input.handle(key(KeyCode::Home));
        input.handle(key(KeyCode::Right));
        assert_eq!(input.handle(key(KeyCode::Tab)), InputResult::Continue);
        assert_eq!(input.value(), "hello");
        assert!(input.completion_index.is_none());
    }

    #[test]
    fn completion_error_on_bad_dir_clears_on_next_key() {
        let mut input = LineInput::path("/nonexistent_zzz_dir/");
        input.handle(key(KeyCode::Tab));
        assert!(input.completion_error);
        assert!(input.completions.is_empty());

        input.handle(key(KeyCode::Left));
        assert!(!input.completion_error);
    }

    #[test]
    fn tab_cycles_dirs_then_images_and_backtab_reverses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alpha.png"), "").unwrap();
        std::fs::write(dir.path().join("beta.jpg"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("gamma_dir")).unwrap();
        let path = format!("{}/", dir.path().display());

        let mut input = LineInput::path(&path);
        input.handle(key(KeyCode::Tab));
        assert_eq!(input.completions.len(), 3);
        assert!(input.value().ends_with(&format!("gamma_dir{}", std::path::MAIN_SEPARATOR)));

        input.handle(key(KeyCode::Tab));
        assert!(input.value().ends_with("alpha.png"));
        input.handle(key(KeyCode::Tab));
        assert!(input.value().ends_with("beta.jpg"));
        input.handle(key(KeyCode::BackTab));
        assert!(input.value().ends_with("alpha.png"));
    }

    #[test]
    fn typing_resets_completion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scan.png"), "").unwrap();
        let mut input = LineInput::path(&format!("{}/", dir.path().display()));
        input.handle(key(KeyCode::Tab));
        assert!(input.completion_index.is_some());

        input.handle(key(KeyCode::Char('x')));
        assert!(input.completion_index.is_none());
        assert!(input.value().ends_with("scan.pngx"));
    }

    #[test]
    fn collect_completions_entry_error_returns_empty() {
        let mut input = LineInput::path("");
        let entries: Vec<std::io::Result<(String, bool)>> = vec![
            Ok(("a.png".to_string(), false)),
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "mock")),
        ];
        assert!(input.collect_completions(entries.into_iter(), "/d/", "").is_empty());
        assert!(input.completion_error);
    }

    #[test]
    fn collect_completions_hidden_prefix_and_caps() {
        let mut input = LineInput::path("");
        let entries: Vec<std::io::Result<(String, bool)>> = vec![
            Ok((".cache".to_string(), true)),
            Ok(("zeta.webp".to_string(), false)),
            Ok(("photos".to_string(), true)),
        ];
        let sep = std::path::MAIN_SEPARATOR;
        let result = input.collect_completions(entries.into_iter(), "pfx/", "");
        assert_eq!(result, vec![format!("pfx/photos{sep}"), "pfx/zeta.webp".to_string()]);

        let many = (0..1200).map(|i| Ok((format!("img_{i:04}.png"), false)));
        assert_eq!(input.collect_completions(many, "", "img_").len(), CANDIDATE_LIMIT);
    }
}
