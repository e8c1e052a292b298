use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{AiError, Operation, ProblemInput};
use crate::image::SelectedImage;
use crate::library::{ProblemLibrary, parse_tags};
use crate::store::schema::{self, SavedProblem};
use crate::store::slots::{Slot, SlotStore};

/// Status shown by the solution pane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadingState {
    Idle,
    Analyzing,
    /// Declared for the solution pane but no flow enters it; solving reports
    /// `Analyzing`.
    Solving,
    Success,
    Error,
}

/// Where the problem is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Verifying,
    Verified,
    Solving,
    Solved,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("nothing to submit")]
    EmptyInput,
    #[error("{action} is not available while {phase:?}")]
    NotAvailable { action: &'static str, phase: Phase },
    #[error("no solution yet")]
    NoSolution,
    #[error("a {0} request is already in flight")]
    Busy(&'static str),
    #[error("the library is empty")]
    EmptyLibrary,
}

/// Which input controls apply right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Affordances {
    pub input_column: bool,
    pub verify_button: bool,
    pub verify_enabled: bool,
    pub verification_editor: bool,
    pub learning_actions: bool,
}

/// The live problem plus the saved library, mirrored into a [`SlotStore`]
/// after every mutation. Store failures are logged and never block the
/// transition that caused them.
pub struct ProblemSession {
    store: Box<dyn SlotStore>,
    library: ProblemLibrary,
    selected_image: Option<SelectedImage>,
    text_input: String,
    verification: Option<String>,
    solution: String,
    drills: String,
    loading_state: LoadingState,
    error: Option<Operation>,
    verifying: bool,
    drills_pending: bool,
    analysis_pending: bool,
    focus_mode: bool,
}

fn write_slot(store: &mut dyn SlotStore, slot: Slot, value: &str) {
    if let Err(e) = store.put(slot, value) {
        warn!(slot = slot.key(), "failed to persist slot: {e:#}");
    }
}

impl ProblemSession {
    /// Rebuild the session from whatever the store holds.
    pub fn restore(store: Box<dyn SlotStore>) -> Self {
        let text_input = store.get(Slot::TextInput).unwrap_or_default();
        let verification = store.get(Slot::VerificationResult).filter(|v| !v.is_empty());
        let solution = store.get(Slot::Solution).unwrap_or_default();
        let drills = store.get(Slot::Drills).unwrap_or_default();
        let problems = match store.get(Slot::SavedProblems) {
            Some(raw) => schema::decode_library(&raw).unwrap_or_else(|e| {
                warn!("ignoring unreadable saved problems: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let loading_state = if solution.is_empty() {
            LoadingState::Idle
        } else {
            LoadingState::Success
        };

        Self {
            store,
            library: ProblemLibrary::new(problems),
            selected_image: None,
            text_input,
            verification,
            solution,
            drills,
            loading_state,
            error: None,
            verifying: false,
            drills_pending: false,
            analysis_pending: false,
            focus_mode: false,
        }
    }

    pub fn text_input(&self) -> &str {
        &self.text_input
    }

    pub fn verification(&self) -> Option<&str> {
        self.verification.as_deref()
    }

    pub fn solution(&self) -> &str {
        &self.solution
    }

    pub fn drills(&self) -> &str {
        &self.drills
    }

    pub fn selected_image(&self) -> Option<&SelectedImage> {
        self.selected_image.as_ref()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading_state
    }

    /// Failure shown inline (recognition and solving only).
    pub fn error(&self) -> Option<Operation> {
        self.error
    }

    pub fn library(&self) -> &ProblemLibrary {
        &self.library
    }

    pub fn is_verifying(&self) -> bool {
        self.verifying
    }

    pub fn is_generating_drills(&self) -> bool {
        self.drills_pending
    }

    pub fn is_analyzing_library(&self) -> bool {
        self.analysis_pending
    }

    pub fn focus_mode(&self) -> bool {
        self.focus_mode
    }

    pub fn toggle_focus_mode(&mut self) {
        self.focus_mode = !self.focus_mode;
    }

    /// Focus mode only reshapes the layout once a solution exists.
    pub fn in_focus_layout(&self) -> bool {
        self.focus_mode && !self.solution.is_empty()
    }

    pub fn phase(&self) -> Phase {
        if self.verifying {
            Phase::Verifying
        } else if self.loading_state == LoadingState::Analyzing {
            Phase::Solving
        } else if !self.solution.is_empty() {
            Phase::Solved
        } else if self.verification.is_some() {
            Phase::Verified
        } else {
            Phase::Idle
        }
    }

    pub fn affordances(&self) -> Affordances {
        let unsolved = self.solution.is_empty();
        Affordances {
            input_column: !self.in_focus_layout(),
            verify_button: self.verification.is_none() && unsolved,
            verify_enabled: !self.verifying
                && (self.selected_image.is_some() || !self.text_input.trim().is_empty()),
            verification_editor: self.verification.is_some() && unsolved,
            learning_actions: !unsolved,
        }
    }

    /// Question text used for solving, drills and saving.
    pub fn canonical_problem(&self) -> &str {
        self.verification.as_deref().unwrap_or(&self.text_input)
    }

    pub fn set_text_input(&mut self, text: &str) {
        self.text_input = text.to_string();
        write_slot(self.store.as_mut(), Slot::TextInput, &self.text_input);
    }

    /// Edit the recognized text before solving. Clearing it drops back to
    /// the unverified state.
    pub fn set_verification(&mut self, text: &str) {
        self.verification = (!text.is_empty()).then(|| text.to_string());
        write_slot(
            self.store.as_mut(),
            Slot::VerificationResult,
            self.verification.as_deref().unwrap_or(""),
        );
    }

    fn set_solution(&mut self, solution: String) {
        self.solution = solution;
        write_slot(self.store.as_mut(), Slot::Solution, &self.solution);
    }

    fn set_drills(&mut self, drills: String) {
        self.drills = drills;
        write_slot(self.store.as_mut(), Slot::Drills, &self.drills);
    }

    fn persist_library(&mut self) {
        match schema::encode_library(self.library.problems()) {
            Ok(json) => write_slot(self.store.as_mut(), Slot::SavedProblems, &json),
            Err(e) => warn!("failed to encode saved problems: {e}"),
        }
    }

    pub fn select_image(&mut self, image: SelectedImage) {
        debug!(preview = %image.preview, "image selected");
        self.selected_image = Some(image);
    }

    pub fn clear_image(&mut self) {
        self.selected_image = None;
    }

    pub fn begin_verify(&mut self) -> Result<ProblemInput, SessionError> {
        let phase = self.phase();
        if phase != Phase::Idle {
            return Err(SessionError::NotAvailable {
                action: "verify",
                phase,
            });
        }
        if self.selected_image.is_none() && self.text_input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.verifying = true;
        self.error = None;
        self.set_verification("");
        self.set_solution(String::new());
        self.set_drills(String::new());
        debug!("verification started");

        Ok(ProblemInput {
            image: self.selected_image.as_ref().map(SelectedImage::to_part),
            text: self.text_input.clone(),
        })
    }

    pub fn finish_verify(&mut self, result: Result<String, AiError>) -> Result<(), AiError> {
        if !self.verifying {
            debug!("dropping verification reply with no request in flight");
            return Ok(());
        }
        self.verifying = false;
        match result {
            Ok(text) => {
                info!(chars = text.chars().count(), "problem recognized");
                self.set_verification(&text);
                self.selected_image = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(Operation::Recognize);
                Err(e)
            }
        }
    }

    /// Returns the problem text to send for solving.
    pub fn begin_solve(&mut self) -> Result<String, SessionError> {
        let phase = self.phase();
        if !matches!(phase, Phase::Idle | Phase::Verified) {
            return Err(SessionError::NotAvailable {
                action: "solve",
                phase,
            });
        }
        let problem = self.canonical_problem().to_string();
        if problem.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.loading_state = LoadingState::Analyzing;
        self.error = None;
        self.set_solution(String::new());
        self.set_drills(String::new());
        debug!("solve started");
        Ok(problem)
    }

    pub fn finish_solve(&mut self, result: Result<String, AiError>) -> Result<(), AiError> {
        if self.loading_state != LoadingState::Analyzing {
            debug!("dropping solve reply with no request in flight");
            return Ok(());
        }
        match result {
            Ok(solution) => {
                info!(chars = solution.chars().count(), "solution ready");
                self.set_solution(solution);
                self.loading_state = LoadingState::Success;
                self.focus_mode = true;
                Ok(())
            }
            Err(e) => {
                self.error = Some(Operation::Solve);
                self.loading_state = LoadingState::Error;
                Err(e)
            }
        }
    }

    /// Returns `(problem, solution)` to derive drills from.
    pub fn begin_drills(&mut self) -> Result<(String, String), SessionError> {
        if self.solution.is_empty() {
            return Err(SessionError::NoSolution);
        }
        if self.drills_pending {
            return Err(SessionError::Busy("drills"));
        }
        self.drills_pending = true;
        Ok((self.canonical_problem().to_string(), self.solution.clone()))
    }

    /// Failures leave the loading state alone; the caller raises an alert.
    pub fn finish_drills(&mut self, result: Result<String, AiError>) -> Result<(), AiError> {
        if !self.drills_pending {
            return Ok(());
        }
        self.drills_pending = false;
        let drills = result?;
        info!("drills ready");
        self.set_drills(drills);
        Ok(())
    }

    /// Snapshot the current problem into the library.
    pub fn save(&mut self, tag_entry: &str, now_ms: i64) -> &SavedProblem {
        // Ids are the save time; two saves in the same millisecond must still differ.
        let now_ms = self
            .library
            .problems()
            .first()
            .map_or(now_ms, |newest| now_ms.max(newest.timestamp.saturating_add(1)));
        let problem = SavedProblem::new(
            self.canonical_problem(),
            &self.solution,
            parse_tags(tag_entry),
            now_ms,
        );
        info!(id = %problem.id, tags = problem.tags.len(), "problem saved");
        self.library.add(problem);
        self.persist_library();
        &self.library.problems()[0]
    }

    /// "Reset content": drop the solution, keep the question.
    pub fn clear_solution(&mut self) {
        self.set_solution(String::new());
    }

    /// Forget any verify, solve or drills request still in flight so its
    /// reply is dropped instead of landing on a different question.
    fn abandon_requests(&mut self) {
        if self.verifying || self.loading_state == LoadingState::Analyzing || self.drills_pending {
            debug!("abandoning in-flight requests");
        }
        self.verifying = false;
        self.drills_pending = false;
        if self.loading_state == LoadingState::Analyzing {
            self.loading_state = LoadingState::Idle;
        }
    }

    /// "Next problem": clear everything tied to the current question.
    pub fn next_problem(&mut self) {
        self.abandon_requests();
        self.loading_state = LoadingState::Idle;
        self.error = None;
        self.set_solution(String::new());
        self.set_drills(String::new());
        self.set_verification("");
        self.set_text_input("");
    }

    /// Trusted load of a saved problem, skipping recognition and solving.
    pub fn load_saved(&mut self, id: &str) -> bool {
        let Some(problem) = self.library.get(id).cloned() else {
            return false;
        };
        self.abandon_requests();
        self.set_text_input(&problem.question_text);
        self.set_verification(&problem.question_text);
        self.set_solution(problem.solution_html);
        self.set_drills(String::new());
        self.loading_state = LoadingState::Success;
        self.error = None;
        self.focus_mode = true;
        debug!(id, "saved problem loaded");
        true
    }

    pub fn delete_saved(&mut self, id: &str) -> bool {
        let removed = self.library.delete(id);
        if removed {
            self.persist_library();
        }
        removed
    }

    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        let toggled = self.library.toggle_favorite(id);
        if toggled {
            self.persist_library();
        }
        toggled
    }

    pub fn begin_analysis(&mut self) -> Result<Vec<SavedProblem>, SessionError> {
        if self.library.is_empty() {
            return Err(SessionError::EmptyLibrary);
        }
        if self.analysis_pending {
            return Err(SessionError::Busy("analysis"));
        }
        self.analysis_pending = true;
        Ok(self.library.problems().to_vec())
    }

    pub fn finish_analysis(&mut self, result: Result<String, AiError>) -> Result<String, AiError> {
        self.analysis_pending = false;
        result
    }
}
